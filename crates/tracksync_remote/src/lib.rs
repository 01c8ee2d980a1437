//! # tracksync Remote
//!
//! The remote tier of tracksync: a single shared document (a GitHub gist)
//! addressed by an opaque id.
//!
//! This crate provides:
//! - [`HttpClient`] - the transport seam, with [`ReqwestHttpClient`] for real use
//! - [`GistClient`] - fetch and patch of the whole document, with
//!   read-merge-write helpers and legacy-file upgrade
//! - [`CredentialValidator`] - two-step token check (identity, then scope)
//! - [`RemoteError`] - failure taxonomy derived from HTTP status and quota headers
//!
//! ## Key Invariants
//!
//! - A write is always preceded by a read, so writing one collection never
//!   clobbers a sibling written by another client
//! - The legacy file is read but never deleted
//! - Validation returns a verdict; it never persists a credential

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod credential;
mod error;
mod gist;
mod http;
mod validator;

#[cfg(test)]
mod testing;

pub use config::RemoteConfig;
pub use credential::Credential;
pub use error::{classify_status, RemoteError, RemoteErrorKind, RemoteResult};
pub use gist::{DocumentState, FetchedDocument, GistClient, GistMetadata};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use validator::{CredentialValidator, TokenVerdict};
