//! Cached fetch engine
//!
//! Queries read through the [`CacheStore`](crate::cache::CacheStore),
//! coalesce identical requests and publish their state over `watch`
//! channels.

pub mod cancel;
pub mod engine;
pub mod inflight;
pub mod options;
pub mod state;

pub use cancel::CancellationToken;
pub use engine::{FetchContext, Operation, Query, operation};
pub use inflight::{FetchOutcome, InFlightRegistry};
pub use options::FetchOptions;
pub use state::QueryState;
