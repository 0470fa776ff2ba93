//! Command execution context
//!
//! Loads configuration once and builds the cache and fetch services the
//! commands share.

use std::sync::Arc;

use crate::cache::{CacheStore, KvStore, MemoryKvStore, SqliteKvStore};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::FetchContext;

/// Context for command execution
pub struct CommandContext {
    /// Loaded and validated configuration
    pub config: Config,
    /// Output format preference
    pub format: OutputFormat,
    /// Persistent cache disabled for this run
    pub no_cache: bool,
}

impl CommandContext {
    /// Load configuration from `--config` or the default location.
    pub fn new(globals: &GlobalOptions) -> Result<Self> {
        let config = Config::load(globals.config_ref())?;

        Ok(Self {
            config,
            format: globals.format,
            no_cache: globals.no_cache,
        })
    }

    /// Open the cache store described by the configuration.
    ///
    /// With `--no-cache` the persistent tier is a throwaway in-memory map.
    pub fn cache_store(&self) -> Result<Arc<CacheStore>> {
        let persistent: Arc<dyn KvStore> = if self.no_cache {
            Arc::new(MemoryKvStore::new())
        } else {
            let dir = self.config.cache_dir()?;
            log::debug!("Opening cache at {}", dir.display());
            Arc::new(SqliteKvStore::open_at(&dir)?)
        };

        Ok(Arc::new(CacheStore::with_settings(
            persistent,
            self.config.cache.namespace.clone(),
            self.config.cache.max_entries,
        )))
    }

    /// Services for building queries
    pub fn fetch_context(&self) -> Result<FetchContext> {
        Ok(FetchContext::new(self.cache_store()?))
    }
}
