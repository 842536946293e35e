use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the object store.
///
/// `NotFound` keeps the exact `Failed to retrieve object: <key>` message the
/// wire protocol carries, but callers should match on the variant rather than
/// the string.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to retrieve object: {key}")]
    NotFound { key: String },

    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server error: {0}")]
    Server(String),

    #[error("response channel closed before a reply arrived")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
