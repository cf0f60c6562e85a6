//! Crate-wide error type
//!
//! Each component has its own error enum; this aggregates them for callers
//! that drive several components and want one `Result`.

use crate::config::ConfigError;
use crate::core_content::StorageError;
use crate::core_credential::CredentialError;
use crate::core_crypto::CryptoError;
use crate::core_identity::{IdentityError, KeystoreError};
use crate::core_ledger::LedgerError;
use crate::core_wallet::SessionError;
use crate::logging::LoggingError;
use thiserror::Error;

/// Result type for cross-component operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

impl Error {
    /// Coarse category, usable as a metrics label
    pub fn category(&self) -> &'static str {
        match self {
            Error::Crypto(_) => "crypto",
            Error::Storage(_) => "storage",
            Error::Ledger(_) => "ledger",
            Error::Keystore(_) | Error::Identity(_) => "identity",
            Error::Credential(_) => "credential",
            Error::Session(_) => "session",
            Error::Config(_) | Error::Logging(_) => "config",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(e) => e.is_retryable(),
            Error::Ledger(e) => e.is_retryable(),
            Error::Identity(e) => e.is_retryable(),
            Error::Credential(e) => e.is_retryable(),
            Error::Session(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err: Error = CryptoError::DecryptionFailed.into();
        assert_eq!(err.category(), "crypto");
        assert!(!err.is_retryable());

        let err: Error = SessionError::NoActiveSession.into();
        assert_eq!(err.category(), "session");
        assert_eq!(err.to_string(), "Session error: no active session");
    }

    #[test]
    fn test_retryability_passes_through() {
        let err: Error = LedgerError::NetworkError("reset".to_string()).into();
        assert!(err.is_retryable());

        let err: Error = CredentialError::Ledger(LedgerError::Timeout("30s".to_string())).into();
        assert_eq!(err.category(), "credential");
        assert!(err.is_retryable());

        let err: Error = StorageError::NotFound("zabc".to_string()).into();
        assert!(!err.is_retryable());
    }
}
