//! Typed request/response values for each ledger operation
//!
//! Every write carries the signer's public key and an Ed25519 signature over a
//! domain-separated payload, so the registry can authorize it without any
//! out-of-band session.

use crate::core_crypto::{CryptoResult, KeyPair, PublicKey, Signature};
use crate::core_identity::{Did, DidDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const DID_REGISTER_DOMAIN: &[u8] = b"tourguard/did-register/v1";
const REVOCATION_ENTRY_DOMAIN: &[u8] = b"tourguard/revocation-entry/v1";
const REVOKE_DOMAIN: &[u8] = b"tourguard/revoke/v1";

/// `0x`-prefixed transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn compute(block_number: u64, payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&block_number.to_be_bytes());
        hasher.update(payload);
        TxHash(format!("0x{}", hasher.finalize().to_hex()))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returned by every write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

fn framed(domain: &[u8], fields: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(domain.len() + fields.iter().map(|f| f.len() + 4).sum::<usize>());
    out.extend_from_slice(domain);
    for field in fields {
        out.extend_from_slice(&(field.len() as u32).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDidRequest {
    pub did: Did,
    pub document: DidDocument,
    #[serde(with = "hex::serde")]
    pub document_hash: [u8; 32],
    pub signer: PublicKey,
    pub signature: Signature,
}

impl RegisterDidRequest {
    /// Build and sign with the current controller key
    pub fn signed(document: DidDocument, controller: &KeyPair) -> CryptoResult<Self> {
        let document_hash = document.hash();
        let did = document.id.clone();
        let payload = Self::payload(&did, &document_hash);
        Ok(Self {
            did,
            document,
            document_hash,
            signer: *controller.public_key(),
            signature: controller.sign(&payload)?,
        })
    }

    pub fn payload(did: &Did, document_hash: &[u8; 32]) -> Vec<u8> {
        framed(DID_REGISTER_DOMAIN, &[did.to_string().as_bytes(), &document_hash[..]])
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        Self::payload(&self.did, &self.document_hash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRevocationRequest {
    pub credential_id: String,
    pub list_id: String,
    pub issuer: Did,
    pub signer: PublicKey,
    pub signature: Signature,
}

impl RegisterRevocationRequest {
    pub fn signed(credential_id: &str, list_id: &str, issuer: &Did, key: &KeyPair) -> CryptoResult<Self> {
        let payload = Self::payload(credential_id, list_id, issuer);
        Ok(Self {
            credential_id: credential_id.to_string(),
            list_id: list_id.to_string(),
            issuer: issuer.clone(),
            signer: *key.public_key(),
            signature: key.sign(&payload)?,
        })
    }

    pub fn payload(credential_id: &str, list_id: &str, issuer: &Did) -> Vec<u8> {
        framed(
            REVOCATION_ENTRY_DOMAIN,
            &[credential_id.as_bytes(), list_id.as_bytes(), issuer.to_string().as_bytes()],
        )
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        Self::payload(&self.credential_id, &self.list_id, &self.issuer)
    }
}

/// Slot allocated for a credential in a revocation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationSlot {
    pub list_id: String,
    pub index: u64,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    pub credential_id: String,
    pub reason: String,
    pub signer: PublicKey,
    pub signature: Signature,
}

impl RevokeRequest {
    pub fn signed(credential_id: &str, reason: &str, key: &KeyPair) -> CryptoResult<Self> {
        let payload = Self::payload(credential_id, reason);
        Ok(Self {
            credential_id: credential_id.to_string(),
            reason: reason.to_string(),
            signer: *key.public_key(),
            signature: key.sign(&payload)?,
        })
    }

    pub fn payload(credential_id: &str, reason: &str) -> Vec<u8> {
        framed(REVOKE_DOMAIN, &[credential_id.as_bytes(), reason.as_bytes()])
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        Self::payload(&self.credential_id, &self.reason)
    }
}

/// Registry view of one credential's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRecord {
    pub credential_id: String,
    pub list_id: String,
    pub index: u64,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub issuer: Did,
    pub allocated_in: TxReceipt,
    pub revoked_in: Option<TxReceipt>,
}

/// Registry view of one DID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidRecord {
    pub document: DidDocument,
    #[serde(with = "hex::serde")]
    pub document_hash: [u8; 32],
    pub controller: PublicKey,
    pub registered_in: TxReceipt,
    pub updated_in: TxReceipt,
}
