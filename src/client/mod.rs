//! Remote data sources
//!
//! The engine only needs an [`Operation`](crate::fetch::Operation); this
//! module supplies one backed by the platform's HTTP API.

pub mod http;

pub use http::ApiClient;
