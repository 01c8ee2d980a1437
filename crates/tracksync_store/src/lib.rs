//! # tracksync Store
//!
//! The local tier of tracksync: a synchronous key → JSON value store that
//! lives on the client device.
//!
//! ## Design Principles
//!
//! - Backends are string stores (read, write, remove); they never parse JSON
//! - [`LocalStore`] owns serialization and absorbs every backend failure:
//!   reads degrade to "absent", writes report `false` and log a warning
//! - Must be `Send + Sync` so one store can be shared by the engine and the UI
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral sessions
//! - [`DirectoryBackend`] - One JSON file per key in a directory
//!
//! ## Example
//!
//! ```rust
//! use tracksync_store::{keys, LocalStore};
//!
//! let store = LocalStore::in_memory();
//! assert!(store.set(keys::GIST_ID, &"abc123".to_string()));
//! let id: Option<String> = store.get(keys::GIST_ID);
//! assert_eq!(id.as_deref(), Some("abc123"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod directory;
mod error;
mod memory;
mod store;

pub use backend::KeyValueBackend;
pub use directory::DirectoryBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use store::LocalStore;

/// Fixed keys of the local store namespace.
pub mod keys {
    /// Catalog of all known tracks.
    pub const TRACKS: &str = "tracks";
    /// User-ordered selection of tracks.
    pub const PLAYLIST: &str = "playlist";
    /// Output of the moderation queue.
    pub const APPROVED_TRACKS: &str = "approvedTracks";
    /// Identifier of the shared remote document.
    pub const GIST_ID: &str = "gist-id";
    /// Bearer credential for the remote document API.
    pub const GITHUB_TOKEN: &str = "github-token";

    /// Collection keys that take part in remote sync, in sync order.
    pub const COLLECTIONS: [&str; 3] = [TRACKS, PLAYLIST, APPROVED_TRACKS];

    /// Keys holding the remote credential. Never valid as a collection.
    pub const RESERVED: [&str; 2] = [GIST_ID, GITHUB_TOKEN];

    /// Returns true if `key` holds credential state.
    pub fn is_reserved(key: &str) -> bool {
        RESERVED.contains(&key)
    }
}
