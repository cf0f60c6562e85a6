//! Authenticated symmetric envelopes (AES-256-GCM)
//!
//! Envelopes are self-describing: salt, nonce and KDF parameters travel with
//! the ciphertext so the same password can re-derive the key later. The
//! password itself is never part of the structure. Envelopes are persisted
//! as JSON (keystore entries, backups) or split into a ciphertext blob plus
//! `KycEnvelopeMeta`; any file-level framing belongs to the store.

use super::errors::{CryptoError, CryptoResult};
use super::kdf::{DerivedKey, KdfParams, SALT_LEN};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Nonce length for AES-GCM (12 bytes = 96 bits)
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "hex::serde")]
    pub salt: [u8; SALT_LEN],
    pub kdf_params: KdfParams,
}

/// Encrypt under a derived key with a fresh random nonce
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> CryptoResult<EncryptedEnvelope> {
    let cipher = Aes256Gcm::new_from_slice(key.key().as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("invalid key: {}", e)))?;
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedEnvelope {
        ciphertext,
        nonce: nonce_bytes,
        salt: *key.salt(),
        kdf_params: *key.params(),
    })
}

/// Decrypt and authenticate. Plaintext is returned in a zeroizing buffer.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &DerivedKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if envelope.ciphertext.len() < TAG_LEN {
        return Err(CryptoError::MalformedEnvelope("ciphertext shorter than tag".to_string()));
    }
    let cipher = Aes256Gcm::new_from_slice(key.key().as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptionFailed)
}
