//! Off-chain encrypted KYC payloads
//!
//! Only the ciphertext goes to the content store. The salt, nonce and KDF
//! parameters needed to decrypt it travel as metadata next to the content id.

use super::credential::VerifiableCredential;
use crate::core_content::ContentId;
use crate::core_crypto::{EncryptedEnvelope, KdfParams, SALT_LEN};
use crate::core_crypto::envelope::NONCE_LEN;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycEnvelopeMeta {
    pub content_id: ContentId,
    #[serde(with = "hex::serde")]
    pub salt: [u8; SALT_LEN],
    #[serde(with = "hex::serde")]
    pub nonce: [u8; NONCE_LEN],
    pub kdf_params: KdfParams,
    pub submission_timestamp: DateTime<Utc>,
}

impl KycEnvelopeMeta {
    pub(crate) fn describe(content_id: ContentId, envelope: &EncryptedEnvelope, submitted: DateTime<Utc>) -> Self {
        Self {
            content_id,
            salt: envelope.salt,
            nonce: envelope.nonce,
            kdf_params: envelope.kdf_params,
            submission_timestamp: submitted,
        }
    }

    /// Reassemble the envelope from stored ciphertext
    pub fn envelope(&self, ciphertext: Vec<u8>) -> EncryptedEnvelope {
        EncryptedEnvelope {
            ciphertext,
            nonce: self.nonce,
            salt: self.salt,
            kdf_params: self.kdf_params,
        }
    }
}

/// Result of a KYC submission: where the data lives and the credential
/// pointing at it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub meta: KycEnvelopeMeta,
    pub credential: VerifiableCredential,
}
