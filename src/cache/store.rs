//! Key-value storage backends for the vector cache

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{LinkError, Result};

/// Minimal persistent key-value store.
///
/// `set` reports a full store as [`LinkError::QuotaExceeded`] so callers can
/// evict and retry.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    /// All keys starting with `prefix`, in ascending order.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete every key starting with `prefix`, returning how many went.
    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys(prefix)?;
        for key in &keys {
            self.delete(key)?;
        }
        Ok(keys.len())
    }
}

/// In-process store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    max_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys + values exceed `max_bytes`.
    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            max_bytes: Some(max_bytes),
        }
    }

    /// Bytes currently held (keys + values).
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(max_bytes) = self.max_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            if used + needed > max_bytes {
                return Err(LinkError::QuotaExceeded(format!(
                    "memory store: {needed} bytes requested, {used}/{max_bytes} in use"
                )));
            }
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
