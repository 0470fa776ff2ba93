//! Two-tier response cache
//!
//! An in-memory map in front of a durable key/value store, with per-entry
//! TTL and a capacity bound on the durable tier.

pub mod entry;
pub mod key;
pub mod storage;
pub mod store;

use std::time::Duration;

/// Prefix applied to every persistent key owned by the cache
pub const DEFAULT_NAMESPACE: &str = "cache_";

/// Persistent entries kept per namespace before eviction kicks in
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// TTL applied when a query does not choose its own
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60); // 5 min

// Re-export main types
pub use entry::CacheEntry;
pub use key::cache_key;
pub use storage::{KvStore, MemoryKvStore, SqliteKvStore};
pub use store::{CacheStats, CacheStore, Eviction};
