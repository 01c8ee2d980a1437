//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur inside a storage backend.
///
/// These never escape [`crate::LocalStore`]; they are logged there and
/// turned into "absent" reads or failed writes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the value would exceed the configured quota.
    #[error("storage quota exceeded: {required} bytes required, quota is {quota}")]
    QuotaExceeded {
        /// Total bytes the store would hold after the write.
        required: u64,
        /// The configured quota in bytes.
        quota: u64,
    },

    /// The key cannot be represented by this backend.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}
