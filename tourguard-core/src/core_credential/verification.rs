//! Verification outcomes
//!
//! Every defect found is recorded; a credential is valid only when the list
//! is empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum VerificationError {
    #[error("issuer {issuer} could not be resolved: {reason}")]
    IssuerUnresolvable { issuer: String, reason: String },

    #[error("proof is missing")]
    MissingProof,

    #[error("verification method {verification_method} is not authorized by the signer's DID document")]
    UnknownVerificationMethod { verification_method: String },

    #[error("signature is invalid")]
    InvalidSignature,

    #[error("credential has been revoked{}", reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default())]
    Revoked {
        reason: Option<String>,
        revoked_at: Option<DateTime<Utc>>,
    },

    #[error("revocation status unavailable: {reason}")]
    RevocationStatusUnavailable { reason: String },

    #[error("issuance date {issuance_date} is in the future")]
    IssuedInFuture { issuance_date: DateTime<Utc> },

    #[error("credential expired at {expiration_date}")]
    Expired { expiration_date: DateTime<Utc> },

    #[error("malformed credential: {reason}")]
    Malformed { reason: String },

    #[error("holder {holder} could not be resolved: {reason}")]
    HolderUnresolvable { holder: String, reason: String },

    #[error("presentation challenge does not match")]
    ChallengeMismatch,

    #[error("credential {credential_id} was not issued to the presentation holder")]
    SubjectNotHolder { credential_id: String },

    #[error("embedded credential {credential_id} is invalid")]
    CredentialInvalid {
        credential_id: String,
        errors: Vec<VerificationError>,
    },
}

impl VerificationError {
    /// True for a revocation, also when nested inside a presentation
    pub fn is_revocation(&self) -> bool {
        match self {
            VerificationError::Revoked { .. } => true,
            VerificationError::CredentialInvalid { errors, .. } => errors.iter().any(|e| e.is_revocation()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub errors: Vec<VerificationError>,
}

impl VerificationResult {
    pub fn from_errors(errors: Vec<VerificationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.errors.iter().any(|e| e.is_revocation())
    }
}
