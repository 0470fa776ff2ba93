//! Two-tier cache store
//!
//! Memory tier for speed, a [`KvStore`] for durability across restarts.
//! Every failure inside this module is logged and turned into a miss: the
//! cache is an optimization, callers never see its errors.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::entry::{CacheEntry, StoredRecord, now_millis};
use super::storage::KvStore;
use super::{DEFAULT_MAX_ENTRIES, DEFAULT_NAMESPACE};
use crate::error::CacheError;

/// What to remove in [`CacheStore::evict`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    /// Exactly this key
    Key(String),
    /// Every key containing this substring
    Pattern(String),
    /// Everything in the store's namespace
    All,
}

/// Snapshot of the persistent tier for this namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    /// Oldest `stored_at` among valid entries (ms since epoch)
    pub oldest_entry: Option<i64>,
    /// Newest `stored_at` among valid entries (ms since epoch)
    pub newest_entry: Option<i64>,
}

/// TTL-aware, capacity-bounded cache for JSON payloads
pub struct CacheStore {
    namespace: String,
    max_entries: usize,
    memory: Mutex<HashMap<String, CacheEntry>>,
    persistent: Arc<dyn KvStore>,
    /// Serializes capacity eviction so the read-then-delete pass is atomic
    eviction: tokio::sync::Mutex<()>,
}

impl CacheStore {
    /// Create a store with the default namespace and capacity
    pub fn new(persistent: Arc<dyn KvStore>) -> Self {
        Self::with_settings(persistent, DEFAULT_NAMESPACE, DEFAULT_MAX_ENTRIES)
    }

    /// Create a store with an explicit namespace and capacity
    pub fn with_settings(
        persistent: Arc<dyn KvStore>,
        namespace: impl Into<String>,
        max_entries: usize,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            max_entries,
            memory: Mutex::new(HashMap::new()),
            persistent,
            eviction: tokio::sync::Mutex::new(()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a fresh entry, memory tier first.
    ///
    /// Stale entries found along the way are removed.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = now_millis();

        if let Some(entry) = self.memory_get(key, now) {
            return Some(entry);
        }

        let storage_key = self.storage_key(key);
        let raw = match self.persistent.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let record: StoredRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Discarding unreadable cache entry {}: {}", key, e);
                self.remove_persistent(&storage_key).await;
                return None;
            }
        };

        let entry = CacheEntry::from_record(key, record);
        if !entry.is_fresh_at(now) {
            log::debug!("Cache expired: {}", key);
            self.remove_persistent(&storage_key).await;
            return None;
        }

        log::debug!("Cache hit (persistent): {}", key);
        self.memory_put(entry.clone());
        Some(entry)
    }

    /// Store `data` under `key`, overwriting any previous entry.
    ///
    /// Runs capacity eviction before returning when the namespace holds more
    /// than `max_entries` entries.
    pub async fn set(&self, key: &str, data: Value, ttl: Duration) {
        let entry = CacheEntry::new(key, data, ttl);
        let storage_key = self.storage_key(key);

        match serde_json::to_string(&entry.to_record()) {
            Ok(json) => {
                if let Err(e) = self.persistent.set(&storage_key, &json).await {
                    log::warn!("Cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => log::warn!("Failed to serialize cache entry {}: {}", key, e),
        }
        self.memory_put(entry);

        self.enforce_capacity(key).await;
    }

    /// Remove entries from both tiers.
    ///
    /// Returns the number of persistent entries removed.
    pub async fn evict(&self, target: Eviction) -> usize {
        self.memory_retain(|key| !matches_target(key, &target));

        let keys = match self.namespaced_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Cache eviction failed to list keys: {}", e);
                return 0;
            }
        };

        let doomed: Vec<String> = keys
            .into_iter()
            .filter(|(key, _)| matches_target(key, &target))
            .map(|(_, storage_key)| storage_key)
            .collect();

        if doomed.is_empty() {
            return 0;
        }

        match self.persistent.remove_many(&doomed).await {
            Ok(()) => {
                log::debug!("Evicted {} cache entries ({:?})", doomed.len(), target);
                doomed.len()
            }
            Err(e) => {
                log::warn!("Cache eviction failed: {}", e);
                0
            }
        }
    }

    /// Count valid and expired entries in the persistent tier
    pub async fn stats(&self) -> CacheStats {
        let now = now_millis();
        let mut stats = CacheStats::default();

        for (_, record) in self.load_records().await {
            stats.total_entries += 1;
            let Some(record) = record else {
                stats.expired_entries += 1;
                continue;
            };

            let entry = CacheEntry::from_record("", record);
            if entry.is_fresh_at(now) {
                stats.valid_entries += 1;
                stats.oldest_entry = Some(
                    stats
                        .oldest_entry
                        .map_or(entry.stored_at, |t| t.min(entry.stored_at)),
                );
                stats.newest_entry = Some(
                    stats
                        .newest_entry
                        .map_or(entry.stored_at, |t| t.max(entry.stored_at)),
                );
            } else {
                stats.expired_entries += 1;
            }
        }

        stats
    }

    /// Delete the least-recently-written entries until the namespace fits.
    ///
    /// `written` is the key the calling `set` just stored; it always survives.
    async fn enforce_capacity(&self, written: &str) {
        let _guard = self.eviction.lock().await;

        let keys = match self.namespaced_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Capacity check failed: {}", e);
                return;
            }
        };
        if keys.len() <= self.max_entries {
            return;
        }

        let excess = keys.len() - self.max_entries;
        let mut dated = Vec::with_capacity(keys.len());
        for (key, storage_key) in keys {
            if key == written {
                continue;
            }
            let order = match self.persistent.get(&storage_key).await {
                Ok(Some(raw)) => serde_json::from_str::<StoredRecord>(&raw)
                    .map(|r| (r.timestamp, r.seq))
                    .unwrap_or((i64::MIN, 0)),
                // Vanished or unreadable entries go first
                _ => (i64::MIN, 0),
            };
            dated.push((order, key, storage_key));
        }
        dated.sort_by(|(a, ka, _), (b, kb, _)| a.cmp(b).then_with(|| ka.cmp(kb)));

        let doomed: Vec<(String, String)> = dated
            .into_iter()
            .take(excess)
            .map(|(_, key, storage_key)| (key, storage_key))
            .collect();

        let storage_keys: Vec<String> = doomed.iter().map(|(_, sk)| sk.clone()).collect();
        if let Err(e) = self.persistent.remove_many(&storage_keys).await {
            log::warn!("Capacity eviction failed: {}", e);
            return;
        }

        self.memory_retain(|key| !doomed.iter().any(|(k, _)| k == key));
        log::debug!(
            "Capacity eviction removed {} entries (max {})",
            doomed.len(),
            self.max_entries
        );
    }

    /// Parsed records for every namespaced key; `None` marks unreadable ones
    async fn load_records(&self) -> Vec<(String, Option<StoredRecord>)> {
        let keys = match self.namespaced_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Failed to list cache keys: {}", e);
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(keys.len());
        for (key, storage_key) in keys {
            let record = match self.persistent.get(&storage_key).await {
                Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Failed to read cache entry {}: {}", key, e);
                    None
                }
            };
            records.push((key, record));
        }
        records
    }

    /// `(key, storage_key)` pairs for every persistent key in this namespace
    async fn namespaced_keys(&self) -> Result<Vec<(String, String)>, CacheError> {
        let keys = self.persistent.list_keys().await?;
        Ok(keys
            .into_iter()
            .filter_map(|storage_key| {
                storage_key
                    .strip_prefix(&self.namespace)
                    .map(|key| (key.to_string(), storage_key.clone()))
            })
            .collect())
    }

    async fn remove_persistent(&self, storage_key: &str) {
        if let Err(e) = self.persistent.remove(storage_key).await {
            log::warn!("Failed to remove cache entry {}: {}", storage_key, e);
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn memory_get(&self, key: &str, now: i64) -> Option<CacheEntry> {
        let mut memory = self.memory.lock().ok()?;
        let fresh = memory.get(key).map(|entry| entry.is_fresh_at(now))?;
        if fresh {
            log::debug!("Cache hit (memory): {}", key);
            memory.get(key).cloned()
        } else {
            memory.remove(key);
            None
        }
    }

    fn memory_put(&self, entry: CacheEntry) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(entry.key.clone(), entry);
        }
    }

    fn memory_retain(&self, keep: impl Fn(&str) -> bool) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.retain(|key, _| keep(key));
        }
    }
}

fn matches_target(key: &str, target: &Eviction) -> bool {
    match target {
        Eviction::Key(k) => key == k,
        Eviction::Pattern(p) => key.contains(p.as_str()),
        Eviction::All => true,
    }
}
