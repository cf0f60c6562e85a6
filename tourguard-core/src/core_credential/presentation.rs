//! Holder-signed presentations of one or more credentials

use super::credential::{VerifiableCredential, CREDENTIALS_CONTEXT};
use super::proof::Proof;
use crate::core_identity::Did;
use serde::{Deserialize, Serialize};

pub const VERIFIABLE_PRESENTATION: &str = "VerifiablePresentation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiablePresentation {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub holder: Did,
    pub verifiable_credential: Vec<VerifiableCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl VerifiablePresentation {
    pub(crate) fn unsigned(id: String, holder: Did, credentials: Vec<VerifiableCredential>) -> Self {
        Self {
            context: vec![CREDENTIALS_CONTEXT.to_string()],
            id,
            types: vec![VERIFIABLE_PRESENTATION.to_string()],
            holder,
            verifiable_credential: credentials,
            proof: None,
        }
    }

    pub fn without_proof(&self) -> Self {
        Self {
            proof: None,
            ..self.clone()
        }
    }

    /// Challenge the holder signed, if any
    pub fn challenge(&self) -> Option<&str> {
        self.proof.as_ref().and_then(|p| p.options.challenge.as_deref())
    }
}
