//! # tracksync Engine
//!
//! Dual-tier persistence and sync engine for tracksync.
//!
//! This crate provides:
//! - Local-first reads and writes with best-effort remote mirroring
//! - Sync state machine (idle → syncing → cooldown → idle)
//! - Single-flight sync with immediate throttling (no queuing)
//! - Retry with exponential backoff for transient remote failures
//! - Approved → main promotion for the moderation queue
//! - A refresh hook invoked once per successful sync
//!
//! ## Architecture
//!
//! The engine sits between a UI layer and two tiers:
//! 1. The local store, always read first and always written first
//! 2. The shared remote document, reached only when a credential is set
//!
//! A sync pulls the remote document, merges each remote collection into
//! its local counterpart (local wins ties), stores the result locally, and
//! then pushes it back when the remote lacks anything.
//!
//! ## Key Invariants
//!
//! - At most one sync is in flight per engine
//! - A throttled request makes no remote call
//! - A failed fetch leaves local data untouched and fires no callback
//! - A failed push still keeps the merged records locally
//! - Remote failures never fail a local write
//! - No engine condition is fatal; the worst case is local-only operation

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod guard;
mod outcome;
mod state;

pub use config::{Backend, EngineConfig, RetryPolicy};
pub use engine::{RefreshCallback, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use outcome::{ApprovalOutcome, CollectionSync, RemoteWrite, SaveOutcome, SyncReport};
pub use state::{RemoteHealth, SyncState, SyncStats};
