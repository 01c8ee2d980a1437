//! # tracksync Testkit
//!
//! Test utilities for tracksync.
//!
//! This crate provides:
//! - Record and store fixtures
//! - Property-based test generators using proptest
//! - [`FakeGistServer`], an in-process implementation of the remote
//!   document API behind the [`HttpClient`](tracksync_remote::HttpClient) seam
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tracksync_remote::GistClient;
//! use tracksync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn fetch_from_fake() {
//!     let server = FakeGistServer::new();
//!     server.create_gist("abc", true);
//!     let client = GistClient::new(server.client(), FakeGistServer::config());
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use server::*;
