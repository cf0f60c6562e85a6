//! Ed25519Signature2020-style linked-data proofs
//!
//! Signing input is `canonical(options) ‖ canonical(document without proof)`,
//! where canonical means compact JSON with object keys in sorted order.

use crate::core_crypto::{CryptoResult, KeyPair, PublicKey, Signature};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub const PROOF_TYPE: &str = "Ed25519Signature2020";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    AssertionMethod,
    Authentication,
}

/// Everything in a proof except the signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub created: DateTime<Utc>,
    pub verification_method: String,
    pub proof_purpose: ProofPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

impl ProofOptions {
    pub fn new(verification_method: impl Into<String>, proof_purpose: ProofPurpose) -> Self {
        Self {
            kind: PROOF_TYPE.to_string(),
            created: Utc::now().trunc_subsecs(0),
            verification_method: verification_method.into(),
            proof_purpose,
            challenge: None,
        }
    }

    pub fn with_challenge(mut self, challenge: Option<String>) -> Self {
        self.challenge = challenge;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(flatten)]
    pub options: ProofOptions,
    pub signature_value: Signature,
}

/// Compact JSON with sorted object keys
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    // Value's object map is ordered by key
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&value)
}

fn signing_input<T: Serialize>(document: &T, options: &ProofOptions) -> Result<Vec<u8>, serde_json::Error> {
    let mut input = canonical_json(options)?;
    input.extend_from_slice(&canonical_json(document)?);
    Ok(input)
}

/// Sign `document` (which must not already contain its proof)
pub fn create_proof<T: Serialize>(document: &T, options: ProofOptions, key: &KeyPair) -> CryptoResult<Proof> {
    let input = signing_input(document, &options)
        .map_err(|e| crate::core_crypto::CryptoError::Encoding(e.to_string()))?;
    Ok(Proof {
        signature_value: key.sign(&input)?,
        options,
    })
}

pub fn verify_proof<T: Serialize>(document: &T, proof: &Proof, key: &PublicKey) -> bool {
    match signing_input(document, &proof.options) {
        Ok(input) => key.verify(&input, &proof.signature_value),
        Err(_) => false,
    }
}
