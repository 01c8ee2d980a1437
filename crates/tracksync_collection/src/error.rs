//! Error types for the data model.

use thiserror::Error;

/// Result type for collection and document operations.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Errors raised while reading documents or collections.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Content is valid JSON but not in the expected shape.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Content is not valid JSON, or a value failed to (de)serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectionError {
    /// Creates a malformed-document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
