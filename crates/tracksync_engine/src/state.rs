//! Observable engine state: sync phase, remote health, statistics.

use chrono::{DateTime, Utc};
use std::fmt;
use tracksync_remote::RemoteError;

/// The sync phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No sync running and the cooldown has elapsed.
    Idle,
    /// A sync is in flight.
    Syncing,
    /// The last sync settled less than one cooldown ago.
    Cooldown,
}

impl SyncState {
    /// Returns true if a sync is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if a new sync would be accepted.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Cooldown => "cooldown",
        })
    }
}

/// What the engine last learned about the remote tier.
///
/// Updated by every remote call (load, save, sync), so a bad credential
/// shows up on the first call that uses it, not only on the next sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteHealth {
    /// No credential is configured; the engine is local-only.
    Unconfigured,
    /// A credential is configured but no remote call has been made with it.
    Unverified,
    /// The last remote call succeeded.
    Healthy,
    /// The last remote call was rejected for a reason the user must fix:
    /// bad token, missing scope, private document, or unknown document id.
    Misconfigured(String),
    /// The last remote call failed for a transient reason.
    Unavailable(String),
}

impl RemoteHealth {
    /// Classifies the outcome of a remote call.
    pub fn from_result<T>(result: &Result<T, RemoteError>) -> Self {
        match result {
            Ok(_) => RemoteHealth::Healthy,
            Err(e) if e.is_misconfiguration() => RemoteHealth::Misconfigured(e.to_string()),
            Err(e) => RemoteHealth::Unavailable(e.to_string()),
        }
    }

    /// Returns true if the user has to change the credential.
    pub fn needs_attention(&self) -> bool {
        matches!(self, RemoteHealth::Misconfigured(_))
    }
}

impl fmt::Display for RemoteHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteHealth::Unconfigured => f.write_str("unconfigured"),
            RemoteHealth::Unverified => f.write_str("unverified"),
            RemoteHealth::Healthy => f.write_str("healthy"),
            RemoteHealth::Misconfigured(reason) => write!(f, "misconfigured: {reason}"),
            RemoteHealth::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Syncs that completed.
    pub syncs_completed: u64,
    /// Syncs whose remote step failed.
    pub syncs_failed: u64,
    /// Sync requests rejected as throttled.
    pub syncs_throttled: u64,
    /// Remote retries across all syncs.
    pub retries: u64,
    /// Records pulled from the remote into local collections.
    pub records_pulled: u64,
    /// Syncs that wrote merged collections back to the remote.
    pub pushes: u64,
    /// Syncs whose write-back failed after a successful pull.
    pub pushes_failed: u64,
    /// Completion time of the last successful sync.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Last sync error message.
    pub last_error: Option<String>,
}
