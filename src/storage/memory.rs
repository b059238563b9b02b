//! In-memory key-value store.
//!
//! Backs the session-scoped state (cleared when the process exits) and
//! stands in for durable storage in tests. An optional byte quota mimics a
//! full storage backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{KeyValueStore, StorageError};

#[derive(Default)]
struct Inner {
    values: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
    quota: Option<usize>,
}

/// Cloneable handle to a shared in-memory map.
///
/// Clones observe the same contents, so a test can keep one handle while
/// the store under test owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once the total size of all stored
    /// values would exceed `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                quota: Some(quota),
                ..Inner::default()
            }),
        }
    }

    /// Number of successful `set` calls since creation.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Whether `key` currently holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.values().contains_key(key)
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written value:
        // every mutation is a single insert or remove.
        self.inner
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut values = self.values();

        if let Some(quota) = self.inner.quota {
            let others: usize = values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let size = others.saturating_add(value.len());
            if size > quota {
                return Err(StorageError::QuotaExceeded { size, quota });
            }
        }

        values.insert(key.to_owned(), value.to_vec());
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values().remove(key);
        Ok(())
    }
}
