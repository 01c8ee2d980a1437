//! Typed JSON facade over a [`KeyValueBackend`].

use crate::backend::KeyValueBackend;
use crate::directory::DirectoryBackend;
use crate::error::StorageResult;
use crate::memory::InMemoryBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// The local store used by the sync engine and the UI layer.
///
/// `LocalStore` never propagates a failure to its caller:
/// - `get` returns `None` for a missing key, an unreadable backend, or a
///   value that does not parse as the requested type
/// - `set` and `remove` return `false` when the backend rejects the write
///
/// Every absorbed failure is logged with `tracing` at `warn` level.
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl LocalStore {
    /// Wraps a backend.
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Creates a store over a fresh [`InMemoryBackend`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(InMemoryBackend::new())
    }

    /// Creates a store over a [`DirectoryBackend`] rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created. This is the only
    /// fallible operation on the store: once opened, failures are absorbed.
    pub fn open_dir(dir: &Path) -> StorageResult<Self> {
        Ok(Self::new(DirectoryBackend::open(dir)?))
    }

    /// Reads and deserializes the value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "local store read failed; treating as missing");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "local value does not parse; treating as missing");
                None
            }
        }
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// Returns `false` if serialization or the backend write failed.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "local value does not serialize; write skipped");
                return false;
            }
        };

        match self.backend.write(key, &raw) {
            Ok(()) => {
                debug!(key, bytes = raw.len(), "local store write");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "local store write failed");
                false
            }
        }
    }

    /// Removes `key`. Returns `false` if the backend failed.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "local store remove failed");
                false
            }
        }
    }

    /// Returns `true` if a value is stored under `key`, parseable or not.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.backend.read(key), Ok(Some(_)))
    }

    /// Lists stored keys. An unreadable backend lists as empty.
    pub fn keys(&self) -> Vec<String> {
        self.backend.keys().unwrap_or_else(|e| {
            warn!(error = %e, "local store key listing failed");
            Vec::new()
        })
    }
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}
