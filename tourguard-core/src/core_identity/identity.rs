//! Public identity view and the unlocked (key-holding) form

use super::did::Did;
use super::document::{DidDocument, ServiceEndpoint, VerificationMethod};
use super::errors::{IdentityError, IdentityResult};
use crate::core_crypto::{DerivedKey, KeyAlgorithm, KeyPair, PrivateKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Lifecycle of a local identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityState {
    Uninitialized,
    /// Keys generated, not yet anchored
    Created,
    /// Anchored on the ledger and held locally (encrypted)
    Registered,
    /// Decrypted in memory
    Loaded,
    Locked,
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdentityState::Uninitialized => "uninitialized",
            IdentityState::Created => "created",
            IdentityState::Registered => "registered",
            IdentityState::Loaded => "loaded",
            IdentityState::Locked => "locked",
        };
        f.write_str(name)
    }
}

/// Public identity: safe to log, cache and display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub identifier: Did,
    pub alias: String,
    /// Key URL of the current controller key
    pub controller_key: String,
    pub public_keys: Vec<VerificationMethod>,
    pub service_endpoints: Vec<ServiceEndpoint>,
}

impl Identity {
    pub fn from_document(alias: &str, document: &DidDocument) -> Self {
        Self {
            identifier: document.id.clone(),
            alias: alias.to_string(),
            controller_key: document.authentication.first().cloned().unwrap_or_default(),
            public_keys: document.verification_method.clone(),
            service_endpoints: document.service.clone(),
        }
    }
}

/// Private key material as encrypted at rest
#[derive(Serialize, Deserialize)]
pub(crate) struct IdentitySecrets {
    pub signing: PrivateKey,
    pub agreement: PrivateKey,
    pub generation: u32,
}

impl IdentitySecrets {
    pub fn to_bytes(&self) -> IdentityResult<Zeroizing<Vec<u8>>> {
        bincode::serialize(self)
            .map(Zeroizing::new)
            .map_err(|e| IdentityError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> IdentityResult<Self> {
        let secrets: Self = bincode::deserialize(bytes).map_err(|e| IdentityError::Serialization(e.to_string()))?;
        if secrets.signing.algorithm() != KeyAlgorithm::Ed25519 || secrets.agreement.algorithm() != KeyAlgorithm::X25519 {
            return Err(IdentityError::KeyMismatch("unexpected key algorithms".to_string()));
        }
        Ok(secrets)
    }
}

/// An identity whose private keys are in memory
///
/// Holds the session key derived from the password (never the password).
/// Every secret field zeroizes on drop.
#[derive(Clone)]
pub struct UnlockedIdentity {
    pub(crate) identity: Identity,
    pub(crate) document: DidDocument,
    pub(crate) signing: KeyPair,
    pub(crate) agreement: KeyPair,
    pub(crate) session_key: DerivedKey,
}

impl UnlockedIdentity {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn did(&self) -> &Did {
        &self.identity.identifier
    }

    pub fn document(&self) -> &DidDocument {
        &self.document
    }

    pub fn signing_key(&self) -> &KeyPair {
        &self.signing
    }

    pub fn agreement_key(&self) -> &KeyPair {
        &self.agreement
    }

    /// Key URL used as `verificationMethod` in proofs
    pub fn assertion_method(&self) -> String {
        self.document
            .assertion_method
            .first()
            .cloned()
            .unwrap_or_else(|| self.identity.controller_key.clone())
    }

    pub fn authentication_method(&self) -> String {
        self.identity.controller_key.clone()
    }

    pub fn session_key(&self) -> &DerivedKey {
        &self.session_key
    }
}

impl fmt::Debug for UnlockedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedIdentity")
            .field("identifier", &self.identity.identifier)
            .field("alias", &self.identity.alias)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}
