//! Credential kinds and their typed claim sets

use super::kyc::KycEnvelopeMeta;
use crate::core_crypto::SealedBox;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
    #[serde(rename = "KycCredential")]
    Kyc,
    #[serde(rename = "GroupMembershipCredential")]
    GroupMembership,
    #[serde(rename = "EmergencyContactCredential")]
    EmergencyContact,
    #[serde(rename = "TravelCompletionCredential")]
    TravelCompletion,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 4] = [
        CredentialKind::Kyc,
        CredentialKind::GroupMembership,
        CredentialKind::EmergencyContact,
        CredentialKind::TravelCompletion,
    ];

    /// Name used in the credential's `type` array
    pub fn type_name(&self) -> &'static str {
        match self {
            CredentialKind::Kyc => "KycCredential",
            CredentialKind::GroupMembership => "GroupMembershipCredential",
            CredentialKind::EmergencyContact => "EmergencyContactCredential",
            CredentialKind::TravelCompletion => "TravelCompletionCredential",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    Basic,
    Enhanced,
    Full,
}

impl VerificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationLevel::Basic => "basic",
            VerificationLevel::Enhanced => "enhanced",
            VerificationLevel::Full => "full",
        }
    }
}

impl std::str::FromStr for VerificationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(VerificationLevel::Basic),
            "enhanced" => Ok(VerificationLevel::Enhanced),
            "full" => Ok(VerificationLevel::Full),
            other => Err(format!("unknown verification level {:?}", other)),
        }
    }
}

/// Know-your-customer attestation. Personal data stays off-chain and
/// encrypted; `kycData` only points at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycClaims {
    pub nationality: String,
    pub verification_level: VerificationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_data: Option<KycEnvelopeMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Guide,
    Leader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipClaims {
    pub group_id: String,
    pub group_name: String,
    pub role: GroupRole,
}

/// Emergency contact; detailed contact data can be sealed to the contact's
/// key-agreement key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContactClaims {
    pub contact_name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_details: Option<SealedBox>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelCompletionClaims {
    pub trip_id: String,
    pub destination: String,
    pub completed_at: DateTime<Utc>,
}

/// Claims for one credential; the variant decides the credential kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialClaims {
    Kyc(KycClaims),
    GroupMembership(GroupMembershipClaims),
    EmergencyContact(EmergencyContactClaims),
    TravelCompletion(TravelCompletionClaims),
}

impl CredentialClaims {
    pub fn kind(&self) -> CredentialKind {
        match self {
            CredentialClaims::Kyc(_) => CredentialKind::Kyc,
            CredentialClaims::GroupMembership(_) => CredentialKind::GroupMembership,
            CredentialClaims::EmergencyContact(_) => CredentialKind::EmergencyContact,
            CredentialClaims::TravelCompletion(_) => CredentialKind::TravelCompletion,
        }
    }

    /// Flattened JSON object placed next to `credentialSubject.id`
    pub fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let value = match self {
            CredentialClaims::Kyc(c) => serde_json::to_value(c)?,
            CredentialClaims::GroupMembership(c) => serde_json::to_value(c)?,
            CredentialClaims::EmergencyContact(c) => serde_json::to_value(c)?,
            CredentialClaims::TravelCompletion(c) => serde_json::to_value(c)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(serde::ser::Error::custom("claims must serialize to an object")),
        }
    }

    /// Parse a claim map back into the typed form for `kind`
    pub fn from_map(kind: CredentialKind, map: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(map.clone());
        Ok(match kind {
            CredentialKind::Kyc => CredentialClaims::Kyc(serde_json::from_value(value)?),
            CredentialKind::GroupMembership => CredentialClaims::GroupMembership(serde_json::from_value(value)?),
            CredentialKind::EmergencyContact => CredentialClaims::EmergencyContact(serde_json::from_value(value)?),
            CredentialKind::TravelCompletion => CredentialClaims::TravelCompletion(serde_json::from_value(value)?),
        })
    }
}
