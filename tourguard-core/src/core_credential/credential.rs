//! Verifiable credential documents

use super::errors::{CredentialError, CredentialResult};
use super::kind::{CredentialClaims, CredentialKind};
use super::proof::Proof;
use crate::core_identity::Did;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";
pub const REVOCATION_STATUS_TYPE: &str = "RevocationList2020Status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSubject {
    pub id: Did,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// Pointer to the credential's slot in a ledger revocation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub revocation_list_id: String,
    pub revocation_list_index: u64,
}

impl CredentialStatus {
    pub fn new(list_id: &str, index: u64) -> Self {
        Self {
            id: format!("{}#{}", list_id, index),
            kind: REVOCATION_STATUS_TYPE.to_string(),
            revocation_list_id: list_id.to_string(),
            revocation_list_index: index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: Did,
    pub issuance_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    pub credential_subject: CredentialSubject,
    pub credential_status: CredentialStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl VerifiableCredential {
    /// Unsigned credential; the proof is attached by the issuer afterwards
    pub(crate) fn unsigned(
        id: String,
        issuer: Did,
        subject: Did,
        claims: &CredentialClaims,
        issuance_date: DateTime<Utc>,
        expiration_date: Option<DateTime<Utc>>,
        status: CredentialStatus,
    ) -> CredentialResult<Self> {
        let claims_map = claims
            .to_map()
            .map_err(|e| CredentialError::InvalidClaims(e.to_string()))?;
        if claims_map.contains_key("id") {
            return Err(CredentialError::InvalidClaims("claims may not set the subject id".to_string()));
        }
        Ok(Self {
            context: vec![CREDENTIALS_CONTEXT.to_string()],
            id,
            types: vec![VERIFIABLE_CREDENTIAL.to_string(), claims.kind().type_name().to_string()],
            issuer,
            issuance_date,
            expiration_date,
            credential_subject: CredentialSubject {
                id: subject,
                claims: claims_map,
            },
            credential_status: status,
            proof: None,
        })
    }

    /// The specific credential kind named in `type`
    pub fn kind(&self) -> Option<CredentialKind> {
        self.types.iter().find_map(|t| CredentialKind::from_type_name(t))
    }

    pub fn subject(&self) -> &Did {
        &self.credential_subject.id
    }

    /// Raw claim value by name
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.credential_subject.claims.get(name)
    }

    /// Typed claims
    pub fn claims(&self) -> CredentialResult<CredentialClaims> {
        let kind = self
            .kind()
            .ok_or_else(|| CredentialError::Malformed(format!("{} has no known credential type", self.id)))?;
        CredentialClaims::from_map(kind, &self.credential_subject.claims)
            .map_err(|e| CredentialError::InvalidClaims(e.to_string()))
    }

    /// This credential with the proof removed, i.e. the signed document
    pub fn without_proof(&self) -> Self {
        Self {
            proof: None,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> CredentialResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> CredentialResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
