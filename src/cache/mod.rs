//! Persistent embedding vector cache
//!
//! Vectors are keyed by a content hash and stored as JSON
//! `{ "timestamp": <unix millis>, "vector": [...] }` under `vector_<hash>`.
//!
//! Eviction: entries older than the TTL read as misses and are removed.
//! When the backing store reports its quota exceeded, expired entries are
//! swept first; if the write still does not fit, the whole cache is cleared
//! and the write retried once.

pub mod sqlite;
pub mod store;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{LinkError, Result};

pub use sqlite::SqliteStore;
pub use store::{KvStore, MemoryStore};

/// Key prefix shared by every cached vector.
pub const CACHE_PREFIX: &str = "vector_";

/// Default time-to-live: 7 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Number of successful writes between expired-entry sweeps.
const SWEEP_EVERY: u64 = 64;

/// A cached embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVector {
    pub hash: String,
    pub vector: Vec<f32>,
    /// Creation time in unix milliseconds.
    pub created_at: i64,
}

#[derive(Serialize, Deserialize)]
struct StoredVector {
    timestamp: i64,
    vector: Vec<f32>,
}

/// Stable content hash used as the cache key.
#[must_use]
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Hash-keyed vector cache over any [`KvStore`].
pub struct VectorCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    writes: AtomicU64,
}

impl std::fmt::Debug for VectorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl VectorCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            writes: AtomicU64::new(0),
        }
    }

    /// Cache over a fresh unbounded in-memory store.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), ttl)
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(hash: &str) -> String {
        format!("{CACHE_PREFIX}{hash}")
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(&self, created_at: i64, now: i64) -> bool {
        now.saturating_sub(created_at) > self.ttl_millis()
    }

    /// Look up the vector for `text`.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.get_by_hash(&content_hash(text))
    }

    /// Look up by precomputed hash. Expired and corrupt entries are purged
    /// and read as misses; store errors also read as misses.
    pub fn get_by_hash(&self, hash: &str) -> Option<Vec<f32>> {
        self.entry(hash).map(|entry| entry.vector)
    }

    /// Full cached entry for a hash, subject to the same expiry rules.
    pub fn entry(&self, hash: &str) -> Option<CachedVector> {
        let key = Self::key(hash);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "vector cache read failed");
                return None;
            }
        };

        let stored: StoredVector = match serde_json::from_slice(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(hash, error = %err, "corrupt cached vector, purging");
                self.purge(&key);
                return None;
            }
        };

        if self.is_expired(stored.timestamp, Utc::now().timestamp_millis()) {
            debug!(hash, "cached vector expired");
            self.purge(&key);
            return None;
        }

        Some(CachedVector {
            hash: hash.to_string(),
            vector: stored.vector,
            created_at: stored.timestamp,
        })
    }

    fn purge(&self, key: &str) {
        if let Err(err) = self.store.delete(key) {
            warn!(key, error = %err, "failed to purge cache entry");
        }
    }

    /// Store a vector for `text`.
    pub fn set(&self, text: &str, vector: &[f32]) -> Result<()> {
        self.set_by_hash(&content_hash(text), vector)
    }

    /// Store a vector under a precomputed hash, stamped with the current time.
    pub fn set_by_hash(&self, hash: &str, vector: &[f32]) -> Result<()> {
        self.put(&CachedVector {
            hash: hash.to_string(),
            vector: vector.to_vec(),
            created_at: Utc::now().timestamp_millis(),
        })
    }

    /// Write an entry as-is, including its timestamp.
    ///
    /// On quota errors: sweep expired entries and retry, then clear the
    /// whole cache and retry once more. A failure after that is reported as
    /// [`LinkError::CacheWrite`].
    pub fn put(&self, entry: &CachedVector) -> Result<()> {
        let key = Self::key(&entry.hash);
        let payload = serde_json::to_vec(&StoredVector {
            timestamp: entry.created_at,
            vector: entry.vector.clone(),
        })?;

        match self.store.set(&key, &payload) {
            Ok(()) => {}
            Err(LinkError::QuotaExceeded(reason)) => {
                warn!(%reason, "vector cache quota exceeded, evicting");
                self.write_after_eviction(&key, &payload)?;
            }
            Err(err) => return Err(LinkError::CacheWrite(err.to_string())),
        }

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            if let Err(err) = self.cleanup_expired() {
                warn!(error = %err, "periodic cache sweep failed");
            }
        }
        Ok(())
    }

    fn write_after_eviction(&self, key: &str, payload: &[u8]) -> Result<()> {
        let swept = self.cleanup_expired().unwrap_or(0);
        if swept > 0 && self.store.set(key, payload).is_ok() {
            debug!(swept, "write succeeded after expired sweep");
            return Ok(());
        }

        let cleared = self.clear_all().unwrap_or(0);
        warn!(cleared, "cleared vector cache to make room");
        self.store
            .set(key, payload)
            .map_err(|err| LinkError::CacheWrite(format!("retry after clear failed: {err}")))
    }

    /// Remove expired and unreadable entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let mut removed = 0;
        for key in self.store.keys(CACHE_PREFIX)? {
            let stale = match self.store.get(&key)? {
                Some(raw) => serde_json::from_slice::<StoredVector>(&raw)
                    .map_or(true, |stored| self.is_expired(stored.timestamp, now)),
                None => false,
            };
            if stale {
                self.store.delete(&key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        Ok(removed)
    }

    /// Drop every cached vector.
    pub fn clear_all(&self) -> Result<usize> {
        self.store.clear_prefix(CACHE_PREFIX)
    }

    /// Number of cached vectors (expired ones included until swept).
    pub fn size(&self) -> usize {
        self.store.keys(CACHE_PREFIX).map_or(0, |keys| keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> VectorCache {
        VectorCache::in_memory(DEFAULT_TTL)
    }

    #[test]
    fn set_then_get_roundtrips() {
        let cache = cache();
        let v = vec![0.25f32, -1.5, 3.0e-7, 42.0];
        cache.set("hello world", &v).unwrap();
        assert_eq!(cache.get("hello world"), Some(v));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn miss_returns_none() {
        assert!(cache().get("never stored").is_none());
    }

    #[test]
    fn expired_entry_reads_as_miss_and_is_purged() {
        let cache = cache();
        let hash = content_hash("old text");
        let ttl_ms = i64::try_from(DEFAULT_TTL.as_millis()).unwrap();
        cache
            .put(&CachedVector {
                hash: hash.clone(),
                vector: vec![1.0, 2.0],
                created_at: Utc::now().timestamp_millis() - ttl_ms - 1,
            })
            .unwrap();

        assert!(cache.get("old text").is_none());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn corrupt_entry_is_purged() {
        let store = Arc::new(MemoryStore::new());
        let cache = VectorCache::new(store.clone(), DEFAULT_TTL);
        let hash = content_hash("broken");
        store.set(&format!("{CACHE_PREFIX}{hash}"), b"{not json").unwrap();

        assert!(cache.get("broken").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let cache = cache();
        cache.set("fresh", &[1.0]).unwrap();
        cache
            .put(&CachedVector {
                hash: content_hash("stale"),
                vector: vec![1.0],
                created_at: 0,
            })
            .unwrap();

        assert_eq!(cache.cleanup_expired().unwrap(), 1);
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn quota_exceeded_sweeps_expired_first() {
        let store = Arc::new(MemoryStore::with_quota(300));
        let cache = VectorCache::new(store, DEFAULT_TTL);
        cache
            .put(&CachedVector {
                hash: content_hash("stale"),
                vector: vec![1.0; 4],
                created_at: 0,
            })
            .unwrap();
        cache.set("keep", &[2.0; 4]).unwrap();

        // Needs the room held by the stale entry but not by "keep".
        cache.set("new", &[3.0; 4]).unwrap();
        assert!(cache.get("keep").is_some());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn quota_exceeded_clears_everything_when_sweep_is_not_enough() {
        let store = Arc::new(MemoryStore::with_quota(150));
        let cache = VectorCache::new(store, DEFAULT_TTL);
        cache.set("first", &[1.0; 4]).unwrap();

        cache.set("second", &[2.0; 4]).unwrap();
        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("second"), Some(vec![2.0; 4]));
    }

    #[test]
    fn write_that_never_fits_reports_cache_write() {
        let store = Arc::new(MemoryStore::with_quota(8));
        let cache = VectorCache::new(store, DEFAULT_TTL);
        let err = cache.set("too big", &[1.0; 64]).unwrap_err();
        assert!(matches!(err, LinkError::CacheWrite(_)));
    }
}
