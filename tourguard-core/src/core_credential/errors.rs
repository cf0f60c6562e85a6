//! Credential service errors
//!
//! A negative verification outcome is not an error; see
//! [`super::VerificationResult`].

use crate::core_content::StorageError;
use crate::core_crypto::CryptoError;
use crate::core_identity::IdentityError;
use crate::core_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Caller is not the credential's issuer
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("credential not found: {0}")]
    NotFound(String),

    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    #[error("malformed credential: {0}")]
    Malformed(String),

    /// Wrong password or tampered payload; not distinguished
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl CredentialError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CredentialError::Storage(e) => e.is_retryable(),
            CredentialError::Ledger(e) => e.is_retryable(),
            CredentialError::Identity(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CredentialError {
    fn from(err: serde_json::Error) -> Self {
        CredentialError::Serialization(err.to_string())
    }
}

pub type CredentialResult<T> = Result<T, CredentialError>;
