//! Session errors
//!
//! These are user facing. Every way an unlock can fail collapses into
//! `WrongPassword`, whose message never says which check failed.

use crate::core_credential::CredentialError;
use crate::core_crypto::CryptoError;
use crate::core_identity::IdentityError;
use thiserror::Error;

pub const UNABLE_TO_UNLOCK: &str = "unable to unlock";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session")]
    NoActiveSession,

    #[error("unable to unlock")]
    WrongPassword,

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SessionError {
    /// Text safe to show to the user
    pub fn user_message(&self) -> String {
        match self {
            SessionError::WrongPassword => UNABLE_TO_UNLOCK.to_string(),
            SessionError::Identity(e) if e.is_unlock_failure() => UNABLE_TO_UNLOCK.to_string(),
            SessionError::Credential(CredentialError::DecryptionFailed) => "unable to decrypt".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Identity(e) => e.is_retryable(),
            SessionError::Credential(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Unlock failures become `WrongPassword`; everything else passes through
pub(crate) fn from_unlock(err: IdentityError) -> SessionError {
    if err.is_unlock_failure() {
        SessionError::WrongPassword
    } else {
        SessionError::Identity(err)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
