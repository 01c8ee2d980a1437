//! In-memory storage backend for testing.

use crate::backend::KeyValueBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory key-value backend.
///
/// This backend keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Sessions that don't need persistence
///
/// An optional quota (in bytes, counting keys and values) emulates the
/// storage limit of a browser-style local store.
///
/// # Example
///
/// ```rust
/// use tracksync_store::{InMemoryBackend, KeyValueBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.write("tracks", "[]").unwrap();
/// assert_eq!(backend.read("tracks").unwrap().as_deref(), Some("[]"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<BTreeMap<String, String>>,
    quota: Option<u64>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory backend that rejects writes beyond `bytes`.
    #[must_use]
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            quota: Some(bytes),
        }
    }

    /// Returns the number of bytes currently used (keys plus values).
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    /// Clears all data from the backend.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl KeyValueBackend for InMemoryBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.write();

        if let Some(quota) = self.quota {
            let others: u64 = data
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
            let required = others + (key.len() + value.len()) as u64;
            if required > quota {
                return Err(StorageError::QuotaExceeded { required, quota });
            }
        }

        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.data.read().keys().cloned().collect())
    }
}
