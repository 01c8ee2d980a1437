//! Error types for remote operations.

use crate::http::HttpResponse;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// Header carrying the number of requests left in the current quota window.
pub(crate) const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
/// Header carrying the quota reset time as Unix seconds.
pub(crate) const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur when talking to the remote document API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The token is missing, invalid, or expired (HTTP 401).
    #[error("unauthorized: the token is invalid or expired")]
    Unauthorized,

    /// Access denied: insufficient scope or a private document (HTTP 403
    /// with quota remaining).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request quota is exhausted.
    #[error("rate limit exhausted{}", reset_suffix(.reset_at))]
    RateLimited {
        /// When the quota resets, if the server said.
        reset_at: Option<DateTime<Utc>>,
    },

    /// No document exists under the given id (HTTP 404).
    #[error("document {0:?} not found")]
    NotFound(String),

    /// Transport failure, unexpected status, or unreadable response.
    #[error("network error: {0}")]
    Network(String),

    /// The document could not be encoded for writing.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

/// Fieldless discriminant of [`RemoteError`], for retry decisions and
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// See [`RemoteError::Unauthorized`].
    Unauthorized,
    /// See [`RemoteError::Forbidden`].
    Forbidden,
    /// See [`RemoteError::RateLimited`].
    RateLimited,
    /// See [`RemoteError::NotFound`].
    NotFound,
    /// See [`RemoteError::Network`].
    Network,
    /// See [`RemoteError::MalformedDocument`].
    MalformedDocument,
}

impl RemoteError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::Unauthorized => RemoteErrorKind::Unauthorized,
            RemoteError::Forbidden(_) => RemoteErrorKind::Forbidden,
            RemoteError::RateLimited { .. } => RemoteErrorKind::RateLimited,
            RemoteError::NotFound(_) => RemoteErrorKind::NotFound,
            RemoteError::Network(_) => RemoteErrorKind::Network,
            RemoteError::MalformedDocument(_) => RemoteErrorKind::MalformedDocument,
        }
    }

    /// Returns true if retrying later may succeed without user action.
    ///
    /// Credential and addressing problems need the user to fix something.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_) | RemoteError::RateLimited { .. }
        )
    }

    /// Returns true if the error points at a bad credential or document id
    /// rather than at a transient condition.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized | RemoteError::Forbidden(_) | RemoteError::NotFound(_)
        )
    }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(ts) => format!("; resets at {}", ts.to_rfc3339()),
        None => String::new(),
    }
}

/// Classifies a non-success response.
///
/// - 401 → [`RemoteError::Unauthorized`]
/// - 403 → [`RemoteError::RateLimited`] if the remaining-quota header is
///   zero, otherwise [`RemoteError::Forbidden`]
/// - 404 → [`RemoteError::NotFound`] for `document_id`
/// - 429 → [`RemoteError::RateLimited`]
/// - anything else → [`RemoteError::Network`]
pub fn classify_status(response: &HttpResponse, document_id: &str) -> RemoteError {
    match response.status {
        401 => RemoteError::Unauthorized,
        403 if quota_exhausted(response) => RemoteError::RateLimited {
            reset_at: reset_time(response),
        },
        403 => RemoteError::Forbidden(
            api_message(response).unwrap_or_else(|| "access denied".to_string()),
        ),
        404 => RemoteError::NotFound(document_id.to_string()),
        429 => RemoteError::RateLimited {
            reset_at: reset_time(response),
        },
        status => RemoteError::Network(match api_message(response) {
            Some(message) => format!("unexpected HTTP status {status}: {message}"),
            None => format!("unexpected HTTP status {status}"),
        }),
    }
}

fn quota_exhausted(response: &HttpResponse) -> bool {
    response
        .header(RATE_LIMIT_REMAINING)
        .and_then(|v| v.trim().parse::<u64>().ok())
        == Some(0)
}

pub(crate) fn reset_time(response: &HttpResponse) -> Option<DateTime<Utc>> {
    let secs = response.header(RATE_LIMIT_RESET)?.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Extracts the `message` field the API puts in error bodies.
fn api_message(response: &HttpResponse) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_owned)
}
