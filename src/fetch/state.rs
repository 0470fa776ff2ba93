//! Reactive query state

use serde::Serialize;
use serde_json::Value;

/// What a query publishes to its subscribers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    /// Last successfully fetched value; kept when a later attempt fails
    pub data: Option<Value>,
    /// True only while a foreground, non-refresh network fetch runs
    pub is_loading: bool,
    /// Message of the last failed attempt
    pub error: Option<String>,
    /// True only while `refresh()` runs
    pub is_refreshing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_state() {
        let state = QueryState::default();
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert!(!state.is_refreshing);
    }

    #[test]
    fn test_serializes_camel_case() {
        let state = QueryState {
            data: Some(json!([1])),
            is_loading: false,
            error: None,
            is_refreshing: true,
        };

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"data": [1], "isLoading": false, "error": null, "isRefreshing": true})
        );
    }
}
