//! Error types for campusfetch

use std::time::Duration;
use thiserror::Error;

/// Result type alias for campusfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback message when a failed fetch carries nothing more descriptive
pub const GENERIC_FETCH_MESSAGE: &str = "Failed to fetch data";

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A query settled with this user-facing error message
    #[error("{0}")]
    Query(String),

    #[error("Operation failed: {0}")]
    Other(String),
}

/// Errors produced by a fetch attempt.
///
/// Cloneable because a single in-flight request hands the same outcome to
/// every subscriber attached to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request was cancelled")]
    Cancelled,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        /// Message field supplied by the server body, if any
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether this outcome is a silent cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Human-readable message published to the UI.
    ///
    /// Prefers the server-supplied message, then the error's own text, then
    /// a generic fallback.
    pub fn message(&self) -> String {
        match self {
            FetchError::Server {
                message: Some(msg), ..
            } if !msg.trim().is_empty() => msg.clone(),
            FetchError::Other(msg) if msg.trim().is_empty() => GENERIC_FETCH_MESSAGE.to_string(),
            other => {
                let text = other.to_string();
                if text.trim().is_empty() {
                    GENERIC_FETCH_MESSAGE.to_string()
                } else {
                    text
                }
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            FetchError::Network("Failed to connect to API".to_string())
        } else if err.is_decode() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Cache storage errors.
///
/// These stay inside the cache layer: the store logs them and degrades to a
/// miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
