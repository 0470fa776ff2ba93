//! campusfetch: cached, deduplicated, cancellable fetching of remote JSON
//!
//! The [`fetch`] engine serves fresh values from the two-tier [`cache`],
//! shares one request between every consumer asking for the same key, and
//! aborts requests nobody is waiting for any more.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;

pub use error::{Error, FetchError, Result};
pub use fetch::{FetchContext, FetchOptions, Query, QueryState};
