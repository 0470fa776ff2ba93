//! Configuration management for campusfetch

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_NAMESPACE, DEFAULT_TTL, SqliteKvStore};
use crate::error::{ConfigError, Result};
use crate::fetch::FetchOptions;
use crate::fetch::options::DEFAULT_TIMEOUT;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Remote API settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Bearer token sent with each request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the cache database; platform cache dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

/// Request behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub refetch_on_mount: bool,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            namespace: default_namespace(),
            max_entries: default_max_entries(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            refetch_on_mount: false,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".campusfetch").join("config.yaml"))
    }

    /// Load configuration from an explicit path, or the default one.
    ///
    /// A missing file at the default path yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    log::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // The file may hold an API token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Reject values the cache and engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be at least 1".into()).into());
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be at least 1".into()).into());
        }
        if self.cache.namespace.is_empty() {
            return Err(ConfigError::Invalid("cache.namespace must not be empty".into()).into());
        }
        Ok(())
    }

    /// Directory for the persistent cache
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(SqliteKvStore::cache_dir()?),
        }
    }

    /// Base URL, or an error naming the missing setting
    pub fn base_url(&self) -> Result<&str> {
        self.api
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("api.base_url is not set".into()).into())
    }

    /// Query options derived from the configured defaults
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_cache_duration(Duration::from_secs(self.cache.default_ttl_secs))
            .with_timeout(Duration::from_secs(self.fetch.timeout_secs))
            .with_refetch_on_mount(self.fetch.refetch_on_mount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api.base_url.is_none());
        assert!(config.api.token.is_none());
        assert_eq!(config.cache.namespace, "cache_");
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(!config.fetch.refetch_on_mount);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "api:\n  base_url: https://api.example.test\ncache:\n  max_entries: 5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.base_url().unwrap(), "https://api.example.test");
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.cache.namespace, "cache_");
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.api.base_url = Some("https://api.example.test".to_string());
        config.api.token = Some("tok".to_string());
        config.fetch.refetch_on_mount = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "cache:\n  max_entries: 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_entries"));
    }

    #[test]
    fn test_missing_base_url() {
        let config = Config::default();
        assert!(config.base_url().is_err());
    }

    #[test]
    fn test_fetch_options_from_config() {
        let mut config = Config::default();
        config.cache.default_ttl_secs = 60;
        config.fetch.timeout_secs = 5;
        config.fetch.refetch_on_mount = true;

        let opts = config.fetch_options();
        assert_eq!(opts.cache_duration, Duration::from_secs(60));
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert!(opts.refetch_on_mount);
        assert!(opts.use_cache);
        assert!(opts.enabled);
    }

    #[test]
    fn test_cache_dir_override() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/tmp/campusfetch-test"));
        assert_eq!(
            config.cache_dir().unwrap(),
            PathBuf::from("/tmp/campusfetch-test")
        );
    }
}
