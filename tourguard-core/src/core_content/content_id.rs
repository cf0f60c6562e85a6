//! Self-verifying content identifiers
//!
//! `z` + base58btc(multihash), where the multihash is `0x1e` (BLAKE3),
//! `0x20` (32-byte digest length) and the digest itself.

use super::errors::{StorageError, StorageResult};
use crate::core_crypto::encoding::{decode_multibase, encode_multibase};
use crate::core_crypto::hashing::{hash, HASH_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

const BLAKE3_MULTIHASH: [u8; 2] = [0x1e, HASH_LEN as u8];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId {
    encoded: String,
    digest: [u8; HASH_LEN],
}

impl ContentId {
    /// Content address of `bytes`
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let digest = hash(bytes);
        let mut multihash = Vec::with_capacity(2 + HASH_LEN);
        multihash.extend_from_slice(&BLAKE3_MULTIHASH);
        multihash.extend_from_slice(&digest);
        Self {
            encoded: encode_multibase(&multihash),
            digest,
        }
    }

    pub fn parse(value: &str) -> StorageResult<Self> {
        let multihash = decode_multibase(value).map_err(|e| StorageError::InvalidContentId(e.to_string()))?;
        if multihash.len() != 2 + HASH_LEN || multihash[..2] != BLAKE3_MULTIHASH {
            return Err(StorageError::InvalidContentId(format!(
                "{} is not a BLAKE3-256 multihash",
                value
            )));
        }
        let mut digest = [0u8; HASH_LEN];
        digest.copy_from_slice(&multihash[2..]);
        Ok(Self {
            encoded: value.to_string(),
            digest,
        })
    }

    /// True when `bytes` hash to this id
    pub fn verifies(&self, bytes: &[u8]) -> bool {
        hash(bytes) == self.digest
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn digest(&self) -> &[u8; HASH_LEN] {
        &self.digest
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl TryFrom<String> for ContentId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContentId::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.encoded
    }
}

impl std::str::FromStr for ContentId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentId::parse(s)
    }
}

/// Handle returned by `put`; the only way back to the bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlobRef {
    pub content_id: ContentId,
}

impl From<ContentId> for StoredBlobRef {
    fn from(content_id: ContentId) -> Self {
        Self { content_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bytes_same_id() {
        assert_eq!(ContentId::for_bytes(b"blob"), ContentId::for_bytes(b"blob"));
        assert_ne!(ContentId::for_bytes(b"blob"), ContentId::for_bytes(b"blob2"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = ContentId::for_bytes(b"hello");
        assert!(id.as_str().starts_with('z'));
        let parsed = ContentId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
        assert!(parsed.verifies(b"hello"));
        assert!(!parsed.verifies(b"hellp"));
    }

    #[test]
    fn test_parse_rejects_other_multihash() {
        let mut multihash = vec![0x12, 0x20];
        multihash.extend_from_slice(&[0u8; 32]);
        let encoded = encode_multibase(&multihash);
        assert!(matches!(ContentId::parse(&encoded), Err(StorageError::InvalidContentId(_))));
        assert!(matches!(ContentId::parse("Qm123"), Err(StorageError::InvalidContentId(_))));
    }

    #[test]
    fn test_blob_ref_json_shape() {
        let blob = StoredBlobRef::from(ContentId::for_bytes(b"x"));
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["contentId"], serde_json::json!(blob.content_id.as_str()));
    }
}
