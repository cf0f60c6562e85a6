//! Ledger errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger network error: {0}")]
    NetworkError(String),

    #[error("insufficient funds to submit transaction")]
    InsufficientFunds,

    #[error("DID already registered by a different controller: {0}")]
    AlreadyRegistered(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found on ledger: {0}")]
    NotFound(String),

    #[error("revocation entry already exists for credential {0}")]
    DuplicateEntry(String),

    #[error("credential already revoked: {0}")]
    AlreadyRevoked(String),

    #[error("timed out waiting for ledger: {0}")]
    Timeout(String),

    #[error("invalid ledger request: {0}")]
    InvalidRequest(String),
}

impl LedgerError {
    /// Transient failures that may succeed after backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::NetworkError(_) | LedgerError::InsufficientFunds | LedgerError::Timeout(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
