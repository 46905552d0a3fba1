//! Error types for grow space, note and session operations.

use thiserror::Error;

/// Result type alias for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for manager operations.
pub type GrowResult<T> = Result<T, GrowError>;

/// Failures surfaced by a [`RecordStore`](crate::store::RecordStore) backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid record id '{0}'")]
    InvalidId(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors returned to the presentation layer by the managers.
#[derive(Debug, Error)]
pub enum GrowError {
    /// Required input was missing or malformed; the store was not touched.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no user is signed in")]
    Unauthenticated,

    #[error("no grow space is being edited")]
    NoEditSession,

    #[error("grow space {0} is not being edited")]
    NotEditing(String),

    #[error("no grow space notes are loaded")]
    NotesNotLoaded,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(String),
}
