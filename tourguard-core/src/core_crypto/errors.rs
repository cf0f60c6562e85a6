//! Error types for cryptographic operations

use thiserror::Error;

/// Cryptographic failures.
///
/// None of these are retryable. Messages never carry secret material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Wrong key and tampered ciphertext are indistinguishable at the AEAD level
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("blocking task failed: {0}")]
    TaskFailed(String),
}

impl CryptoError {
    /// Crypto failures are always fatal to the current operation
    pub fn is_retryable(&self) -> bool {
        false
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
