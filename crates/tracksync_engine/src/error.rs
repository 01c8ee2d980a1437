//! Error types for the sync engine.

use std::time::Duration;
use thiserror::Error;
use tracksync_remote::RemoteError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Local store failures never appear here: the store absorbs them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A sync is already running, a refresh callback is running, or the
    /// cooldown has not elapsed. Nothing was sent.
    #[error("sync throttled{}", retry_suffix(.retry_after))]
    Throttled {
        /// Time left in the cooldown, when that is the reason.
        retry_after: Option<Duration>,
    },

    /// No remote credential is configured.
    #[error("no remote document configured")]
    NotConfigured,

    /// The key holds credential state and cannot be used as a collection.
    #[error("key {0:?} is reserved for the remote credential")]
    ReservedKey(String),

    /// Fetching the remote document failed; local data was left untouched.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Returns true if the caller may simply try again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Throttled { .. } => true,
            SyncError::NotConfigured | SyncError::ReservedKey(_) => false,
            SyncError::Remote(e) => e.is_retryable(),
        }
    }
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!("; retry in {}ms", d.as_millis()),
        None => String::new(),
    }
}
