//! Cache entries and their persisted record format

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide write counter; orders writes that share a millisecond
static WRITE_SEQ: AtomicU64 = AtomicU64::new(1);

/// A cached payload with its write time and validity window
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    /// Wall-clock write time, milliseconds since the Unix epoch
    pub stored_at: i64,
    pub ttl: Duration,
    /// Write order within this process; 0 for records written without one
    pub seq: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(key: impl Into<String>, data: Value, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            data,
            stored_at: now_millis(),
            ttl,
            seq: WRITE_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Fresh iff `now - stored_at < ttl`
    pub fn is_fresh_at(&self, now: i64) -> bool {
        let age = now.saturating_sub(self.stored_at);
        i128::from(age) < self.ttl.as_millis() as i128
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now_millis())
    }

    /// Sort key for write recency: timestamp, then write sequence
    pub fn write_order(&self) -> (i64, u64) {
        (self.stored_at, self.seq)
    }

    /// Build the persisted record for this entry
    pub fn to_record(&self) -> StoredRecord {
        StoredRecord {
            data: self.data.clone(),
            timestamp: self.stored_at,
            duration: self.ttl.as_millis().min(u64::MAX as u128) as u64,
            seq: self.seq,
        }
    }

    /// Rebuild an entry from a persisted record
    pub fn from_record(key: impl Into<String>, record: StoredRecord) -> Self {
        Self {
            key: key.into(),
            data: record.data,
            stored_at: record.timestamp,
            ttl: Duration::from_millis(record.duration),
            seq: record.seq,
        }
    }
}

/// Persisted JSON form: `{ "data": ..., "timestamp": ms, "duration": ms, "seq": n }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub data: Value,
    pub timestamp: i64,
    pub duration: u64,
    #[serde(default)]
    pub seq: u64,
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
