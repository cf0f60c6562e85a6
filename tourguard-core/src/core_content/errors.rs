//! Content store errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Never stored, unpinned and collected, or removed
    #[error("content not found: {0}")]
    NotFound(String),

    /// Backend temporarily unreachable; retry with backoff
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// Retrieved bytes do not hash to the requested id
    #[error("content corrupted: {0}")]
    Corrupted(String),

    #[error("invalid content id: {0}")]
    InvalidContentId(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
