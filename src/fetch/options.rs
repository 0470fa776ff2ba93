//! Per-query fetch options

use std::time::Duration;

use crate::cache::DEFAULT_TTL;

/// Default time a single request may run before it is aborted
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options recognised by a [`Query`](super::Query).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// When false the query never fetches and keeps its initial state.
    pub enabled: bool,
    /// TTL written with each successful result.
    pub cache_duration: Duration,
    /// When false the cache is neither read nor written.
    pub use_cache: bool,
    /// Requests still running after this long are aborted with a timeout error.
    pub timeout: Duration,
    /// Follow a fresh cache hit with a silent background refetch.
    pub refetch_on_mount: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_duration: DEFAULT_TTL,
            use_cache: true,
            timeout: DEFAULT_TIMEOUT,
            refetch_on_mount: false,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_cache_duration(mut self, ttl: Duration) -> Self {
        self.cache_duration = ttl;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refetch_on_mount(mut self, refetch: bool) -> Self {
        self.refetch_on_mount = refetch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = FetchOptions::default();
        assert!(opts.enabled);
        assert!(opts.use_cache);
        assert!(!opts.refetch_on_mount);
        assert_eq!(opts.cache_duration, Duration::from_secs(300));
        assert_eq!(opts.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chain() {
        let opts = FetchOptions::new()
            .with_enabled(false)
            .with_cache(false)
            .with_cache_duration(Duration::from_secs(1))
            .with_timeout(Duration::from_millis(10))
            .with_refetch_on_mount(true);

        assert!(!opts.enabled);
        assert!(!opts.use_cache);
        assert!(opts.refetch_on_mount);
        assert_eq!(opts.cache_duration, Duration::from_secs(1));
        assert_eq!(opts.timeout, Duration::from_millis(10));
    }
}
