//! HTTP API client
//!
//! Attaches the host-provided bearer token to every request and turns
//! responses into JSON values or [`FetchError`]s.

use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use crate::error::FetchError;
use crate::fetch::{CancellationToken, Operation, operation};

/// Client for the platform's JSON API
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url`, authenticating with `token` if given.
    ///
    /// No transport timeout is set: queries enforce their own.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .user_agent(concat!("campusfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query parameters, abandoning the request on cancel.
    pub async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.send(path, params) => result,
        }
    }

    /// Operation fetching `path` with `params`, for use in a query
    pub fn operation(self: &Arc<Self>, path: &str, params: Vec<(String, String)>) -> Operation {
        let client = Arc::clone(self);
        let path = path.to_string();
        let params = Arc::new(params);

        operation(move |cancel| {
            let client = Arc::clone(&client);
            let path = path.clone();
            let params = Arc::clone(&params);
            async move { client.get_json(&path, &params, &cancel).await }
        })
    }

    async fn send(&self, path: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        log::debug!("GET {}", url);

        let mut request = self.http.get(&url).query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(FetchError::from)?;
        let status = response.status();

        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response.json::<Value>().await.map_err(|e| {
                FetchError::InvalidResponse(format!("Failed to parse response: {}", e))
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(FetchError::Server {
            status: status.as_u16(),
            message: server_message(&body),
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ...}`, `{"error": "..."}` and
/// `{"error": {"message": ...}}`.
pub fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
