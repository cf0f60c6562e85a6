//! Identity errors

use super::keystore::KeystoreError;
use crate::core_crypto::CryptoError;
use crate::core_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("alias already in use: {0}")]
    AliasInUse(String),

    /// No local envelope for this identifier
    #[error("identity not found: {0}")]
    NotFound(String),

    /// Wrong password or corrupted envelope; deliberately not distinguished
    #[error("decryption failed")]
    DecryptionFailed,

    /// Re-authentication with a password that does not match the session
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("stored keys do not match the DID document: {0}")]
    KeyMismatch(String),

    #[error("identity {identifier} is {state}, expected {expected}")]
    InvalidState {
        identifier: String,
        state: String,
        expected: &'static str,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),
}

impl IdentityError {
    pub fn is_retryable(&self) -> bool {
        match self {
            IdentityError::Ledger(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// True for every failure that means "these credentials do not unlock it"
    pub fn is_unlock_failure(&self) -> bool {
        matches!(
            self,
            IdentityError::DecryptionFailed
                | IdentityError::AuthenticationFailed
                | IdentityError::KeyMismatch(_)
                | IdentityError::Crypto(CryptoError::MalformedEnvelope(_))
                | IdentityError::Crypto(CryptoError::DecryptionFailed)
        )
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;
