//! Keystore module
//!
//! Local custody of encrypted identity material. Entries hold the public DID
//! document and the password-encrypted private keys; nothing in an entry is
//! usable without the password, and entries never leave the device.

use crate::core_crypto::EncryptedEnvelope;
use crate::core_identity::{Did, DidDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file_keystore;
pub mod memory_keystore;

pub use file_keystore::FileKeystore;
pub use memory_keystore::MemoryKeystore;

/// Keystore errors
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid keystore file: {0}")]
    InvalidFormat(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// One locally held identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    pub identifier: Did,
    pub alias: String,
    pub document: DidDocument,
    pub envelope: EncryptedEnvelope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Abstract keystore trait
pub trait Keystore: Send + Sync {
    fn load(&self, identifier: &Did) -> Result<StoredIdentity, KeystoreError>;

    /// Insert or replace the entry for `entry.identifier`
    fn save(&self, entry: &StoredIdentity) -> Result<(), KeystoreError>;

    /// Remove an entry; `NotFound` if absent
    fn delete(&self, identifier: &Did) -> Result<(), KeystoreError>;

    fn list(&self) -> Result<Vec<StoredIdentity>, KeystoreError>;

    fn contains(&self, identifier: &Did) -> Result<bool, KeystoreError> {
        match self.load(identifier) {
            Ok(_) => Ok(true),
            Err(KeystoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn find_by_alias(&self, alias: &str) -> Result<Option<StoredIdentity>, KeystoreError> {
        Ok(self.list()?.into_iter().find(|e| e.alias == alias))
    }
}
