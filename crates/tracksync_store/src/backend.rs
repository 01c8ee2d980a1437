//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level key-value backend for the local store.
///
/// Backends store **opaque strings**. They do not know that values are JSON;
/// [`crate::LocalStore`] owns serialization.
///
/// # Invariants
///
/// - `read` returns exactly the string last passed to `write` for that key
/// - `read` of a missing key is `Ok(None)`, not an error
/// - `remove` of a missing key succeeds
/// - A failed `write` leaves the previous value in place
/// - Backends must be `Send + Sync` for concurrent access
pub trait KeyValueBackend: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the quota would be exceeded,
    /// or an I/O error occurs.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key` and its value.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Lists all keys currently stored, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the key listing cannot be read.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
