//! Multibase (base58btc, `z` prefix) encoding used for keys, signatures and content ids

use super::errors::{CryptoError, CryptoResult};

const BASE58BTC_PREFIX: char = 'z';

/// Encode bytes as a base58btc multibase string
pub fn encode_multibase(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 138 / 100 + 2);
    out.push(BASE58BTC_PREFIX);
    out.push_str(&bs58::encode(bytes).into_string());
    out
}

/// Decode a base58btc multibase string
pub fn decode_multibase(value: &str) -> CryptoResult<Vec<u8>> {
    let body = value
        .strip_prefix(BASE58BTC_PREFIX)
        .ok_or_else(|| CryptoError::Encoding(format!("unsupported multibase prefix in {:?}", value)))?;
    bs58::decode(body)
        .into_vec()
        .map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// Serde adapter for `[u8; N]` fields carried as multibase strings
pub(crate) mod multibase_array {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(bytes: &[u8; N], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::encode_multibase(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(d: D) -> Result<[u8; N], D::Error> {
        let encoded = String::deserialize(d)?;
        let bytes = super::decode_multibase(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| D::Error::custom(format!("expected {} bytes, got {}", N, v.len())))
    }
}
