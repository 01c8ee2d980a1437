//! # tracksync Collection
//!
//! Data model and merge rules for tracksync.
//!
//! This crate provides:
//! - [`Record`] - one track entry, identified by `id` and by `(title, artist)`
//! - [`Collection`] - a named, order-significant sequence of records
//! - [`merge`] - the deduplicating, order-preserving union used for both
//!   local/remote reconciliation and approved → main promotion
//! - [`RemoteDocument`] - the JSON object stored in the shared remote file,
//!   including the legacy bare-array shape
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod document;
mod error;
mod record;

pub use collection::{merge, Collection};
pub use document::{RemoteDocument, LAST_UPDATED_KEY, LEGACY_COLLECTION};
pub use error::{CollectionError, CollectionResult};
pub use record::{Record, TrackLength};
