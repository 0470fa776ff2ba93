//! Persistent key/value tier
//!
//! [`KvStore`] is the durable contract the cache store writes through to.
//! [`SqliteKvStore`] keeps small values inline in SQLite and large values
//! (>10KB) as blob files; [`MemoryKvStore`] is a volatile stand-in.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::key::key_digest;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Values larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// Asynchronous string-keyed durable store
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently held, in no particular order
    async fn list_keys(&self) -> Result<Vec<String>>;

    async fn remove_many(&self, keys: &[String]) -> Result<()>;
}

/// SQLite-backed key/value store with file blob support
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
    blobs_dir: PathBuf,
}

impl SqliteKvStore {
    /// Open or create storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/campusfetch on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("campusfetch"))
    }

    /// Open storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                store_key TEXT PRIMARY KEY NOT NULL,
                value TEXT,
                blob_path TEXT,
                updated_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            blobs_dir,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Io("Cache database lock poisoned".to_string()))
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;

        let row: Option<(Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT value, blob_path FROM kv_entries WHERE store_key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((Some(value), None)) => Ok(Some(value)),
            Some((None, Some(blob_path))) => {
                let full_path = self.blobs_dir.join(&blob_path);
                match std::fs::read_to_string(&full_path) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        log::warn!("Failed to read blob {}: {}", blob_path, e);
                        // Row without its blob is useless
                        let _ = conn.execute("DELETE FROM kv_entries WHERE store_key = ?1", [key]);
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    fn set_sync(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;

        // Drop any blob the previous value may have left behind
        let previous_blob: Option<String> = conn
            .query_row(
                "SELECT blob_path FROM kv_entries WHERE store_key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        if value.len() <= INLINE_THRESHOLD {
            conn.execute(
                "INSERT OR REPLACE INTO kv_entries
                 (store_key, value, blob_path, updated_at, size_bytes)
                 VALUES (?1, ?2, NULL, ?3, ?4)",
                params![key, value, now, value.len()],
            )?;
            if let Some(blob_path) = previous_blob {
                self.remove_blob(&blob_path);
            }
        } else {
            let blob_path = self.write_blob(key, value)?;
            conn.execute(
                "INSERT OR REPLACE INTO kv_entries
                 (store_key, value, blob_path, updated_at, size_bytes)
                 VALUES (?1, NULL, ?2, ?3, ?4)",
                params![key, blob_path, now, value.len()],
            )?;
        }
        Ok(())
    }

    fn remove_many_sync(&self, keys: &[String]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut blobs = Vec::new();

        for key in keys {
            let blob: Option<String> = tx
                .query_row(
                    "SELECT blob_path FROM kv_entries WHERE store_key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            blobs.extend(blob);
            tx.execute("DELETE FROM kv_entries WHERE store_key = ?1", [key])?;
        }
        tx.commit()?;

        for blob_path in blobs {
            self.remove_blob(&blob_path);
        }
        Ok(())
    }

    fn list_keys_sync(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT store_key FROM kv_entries")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Write a blob file, sharded by the first 2 chars of the key digest
    fn write_blob(&self, key: &str, value: &str) -> Result<String> {
        let digest = key_digest(key);
        let shard = &digest[..2];
        let shard_dir = self.blobs_dir.join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.json", digest);
        let rel_path = format!("{}/{}", shard, filename);

        std::fs::write(shard_dir.join(&filename), value)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    fn remove_blob(&self, rel_path: &str) {
        let full_path = self.blobs_dir.join(rel_path);
        if let Err(e) = std::fs::remove_file(&full_path) {
            log::debug!("Failed to remove blob {}: {}", rel_path, e);
        }
    }

    /// Nuke the cache (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_sync(key, value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_many_sync(&[key.to_string()])
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.list_keys_sync()
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        self.remove_many_sync(keys)
    }
}

/// Volatile in-process key/value store
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Io("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.lock()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (SqliteKvStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteKvStore::open_at(dir.path()).unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn test_set_get_inline() {
        let (storage, _dir) = test_storage();

        storage.set("key1", "small data").await.unwrap();

        let result = storage.get("key1").await.unwrap();
        assert_eq!(result.as_deref(), Some("small data"));
    }

    #[tokio::test]
    async fn test_set_get_blob() {
        let (storage, dir) = test_storage();
        let data = "x".repeat(20_000); // 20KB - will use blob

        storage.set("key2", &data).await.unwrap();

        let result = storage.get("key2").await.unwrap();
        assert_eq!(result, Some(data));

        let digest = key_digest("key2");
        let blob = dir
            .path()
            .join("blobs")
            .join(&digest[..2])
            .join(format!("{}.json", digest));
        assert!(blob.exists());
    }

    #[tokio::test]
    async fn test_overwrite_blob_with_inline_removes_blob() {
        let (storage, dir) = test_storage();
        let digest = key_digest("k");
        let blob = dir
            .path()
            .join("blobs")
            .join(&digest[..2])
            .join(format!("{}.json", digest));

        storage.set("k", &"y".repeat(20_000)).await.unwrap();
        assert!(blob.exists());

        storage.set("k", "tiny").await.unwrap();
        assert!(!blob.exists());
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("tiny"));
    }

    #[tokio::test]
    async fn test_missing_blob_reads_as_absent() {
        let (storage, dir) = test_storage();
        storage.set("big", &"z".repeat(20_000)).await.unwrap();

        std::fs::remove_dir_all(dir.path().join("blobs")).unwrap();

        assert_eq!(storage.get("big").await.unwrap(), None);
        assert!(storage.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_list_keys() {
        let (storage, _dir) = test_storage();

        storage.set("a", "1").await.unwrap();
        storage.set("b", "2").await.unwrap();
        storage.set("c", "3").await.unwrap();

        storage.remove("a").await.unwrap();
        storage
            .remove_many(&["b".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert_eq!(storage.list_keys().await.unwrap(), vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let storage = SqliteKvStore::open_at(dir.path()).unwrap();
            storage.set("persisted", "yes").await.unwrap();
        }

        let reopened = SqliteKvStore::open_at(dir.path()).unwrap();
        assert_eq!(
            reopened.get("persisted").await.unwrap().as_deref(),
            Some("yes")
        );
    }

    #[tokio::test]
    async fn test_schema_mismatch_rebuilds() {
        let dir = TempDir::new().unwrap();
        {
            let storage = SqliteKvStore::open_at(dir.path()).unwrap();
            storage.set("old", "value").await.unwrap();
            let conn = storage.conn.lock().unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }

        let rebuilt = SqliteKvStore::open_at(dir.path()).unwrap();
        assert_eq!(rebuilt.get("old").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryKvStore::new();

        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        store.set("b", "3").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));

        store.remove_many(&["a".to_string()]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.list_keys().await.unwrap(), vec!["b".to_string()]);
    }
}
