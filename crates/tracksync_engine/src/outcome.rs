//! Results reported by engine operations.

use std::time::Duration;
use tracksync_collection::Collection;
use tracksync_remote::RemoteError;

/// What happened to the remote half of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// No credential is configured; nothing was sent.
    Skipped,
    /// The read-merge-write succeeded.
    Written,
    /// The read-merge-write failed.
    Failed(RemoteError),
}

/// Outcome of `save_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Key that was saved.
    pub key: String,
    /// Whether the local store accepted the write.
    pub local_saved: bool,
    /// Remote half of the save.
    pub remote: RemoteWrite,
}

impl SaveOutcome {
    /// Returns true if the data is durable somewhere and nothing failed.
    pub fn is_success(&self) -> bool {
        self.local_saved && !matches!(self.remote, RemoteWrite::Failed(_))
    }

    /// Returns true if the local write succeeded but the remote one failed.
    pub fn is_partial(&self) -> bool {
        self.local_saved && matches!(self.remote, RemoteWrite::Failed(_))
    }

    /// Returns the remote error, if any.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match &self.remote {
            RemoteWrite::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of `save_approved_tracks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    /// Save of the approved collection.
    pub approved: SaveOutcome,
    /// Save of the promoted main collection.
    pub tracks: SaveOutcome,
    /// The main collection after promotion.
    pub promoted: Collection,
}

impl ApprovalOutcome {
    /// Returns true if both saves succeeded.
    pub fn is_success(&self) -> bool {
        self.approved.is_success() && self.tracks.is_success()
    }
}

/// Per-collection result of a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSync {
    /// Collection key.
    pub name: String,
    /// Records held locally before the sync.
    pub local: usize,
    /// Records held remotely before the sync.
    pub remote: usize,
    /// Records after merging.
    pub merged: usize,
    /// Records that came from the remote only.
    pub pulled: usize,
}

/// Result of a successful sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Per-collection results, in sync order.
    pub collections: Vec<CollectionSync>,
    /// Whether merged collections were written back to the remote.
    pub pushed: bool,
    /// Why the write-back failed. The remote records were still merged
    /// into the local store.
    pub push_error: Option<RemoteError>,
    /// The remote lacks local records but the credential has no token to
    /// write them with.
    pub push_skipped: bool,
    /// Whether the write-back upgraded a legacy or malformed document.
    pub migrated: bool,
    /// Whether every merged collection was stored locally.
    pub local_saved: bool,
    /// Remote retries during this sync.
    pub retries: u32,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl SyncReport {
    /// Total records pulled across collections.
    pub fn pulled(&self) -> usize {
        self.collections.iter().map(|c| c.pulled).sum()
    }

    /// Returns true if the remote now holds everything held locally.
    pub fn is_converged(&self) -> bool {
        self.push_error.is_none() && !self.push_skipped
    }
}
