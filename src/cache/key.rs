//! Cache key derivation
//!
//! Keys stay human-readable (`name|deps`) so eviction by substring pattern
//! works. Anything that needs a filesystem-safe name uses [`key_digest`].

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Separator between the query name and its serialized dependencies
pub const KEY_SEPARATOR: char = '|';

/// Derive a deterministic cache key from a query name and its dependencies.
///
/// Object keys inside the dependencies are sorted, so structurally equal
/// inputs produce the same key regardless of field order.
pub fn cache_key(query_name: &str, dependencies: &[Value]) -> String {
    let deps = Value::Array(dependencies.to_vec());
    format!("{}{}{}", query_name, KEY_SEPARATOR, stable_serialize(&deps))
}

/// Serialize a JSON value with object keys in sorted order.
pub fn stable_serialize(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a plain string cannot fail
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_stable(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 hex digest of a key, used for blob file names.
pub fn key_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_deterministic() {
        let key1 = cache_key("courses", &[json!({"dept": "A", "page": 1})]);
        let key2 = cache_key("courses", &[json!({"page": 1, "dept": "A"})]);

        // Same inputs in different field order should produce same key
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_cache_key_format() {
        let key = cache_key("courses", &[json!("deptA"), json!(2)]);
        assert_eq!(key, r#"courses|["deptA",2]"#);
    }

    #[test]
    fn test_cache_key_different_names() {
        let key1 = cache_key("courses", &[]);
        let key2 = cache_key("exams", &[]);

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_cache_key_different_dependencies() {
        let key1 = cache_key("courses", &[json!("deptA")]);
        let key2 = cache_key("courses", &[json!("deptB")]);

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_dependency_order_matters() {
        let key1 = cache_key("exams", &[json!(1), json!(2)]);
        let key2 = cache_key("exams", &[json!(2), json!(1)]);

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_stable_serialize_nested() {
        let value = json!({"b": [{"z": 1, "a": 2}], "a": null});
        assert_eq!(stable_serialize(&value), r#"{"a":null,"b":[{"a":2,"z":1}]}"#);
    }

    #[test]
    fn test_stable_serialize_escapes_keys() {
        let value = json!({"quo\"te": true});
        assert_eq!(stable_serialize(&value), r#"{"quo\"te":true}"#);
    }

    #[test]
    fn test_key_digest_is_hex_sha256() {
        let digest = key_digest("books|[]");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, key_digest("books|[]"));
    }
}
