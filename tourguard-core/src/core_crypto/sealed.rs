//! Sealed boxes: anonymous public-key encryption to an X25519 recipient
//!
//! An ephemeral X25519 key is generated per message; the shared secret is
//! expanded with HKDF-SHA256 (salt = ephemeral ‖ recipient public keys) into a
//! ChaCha20-Poly1305 key.

use super::errors::{CryptoError, CryptoResult};
use super::keypair::{KeyAlgorithm, KeyPair, PublicKey, KEY_LEN};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

const HKDF_INFO: &[u8] = b"tourguard-sealed-box-v1";
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBox {
    pub ephemeral_public: PublicKey,
    #[serde(with = "hex::serde")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

fn box_cipher(secret: &StaticSecret, peer: &[u8; KEY_LEN], ephemeral: &[u8; KEY_LEN], recipient: &[u8; KEY_LEN]) -> CryptoResult<ChaCha20Poly1305> {
    let shared = secret.diffie_hellman(&X25519Public::from(*peer));
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKey("low-order public key".to_string()));
    }
    let mut salt = [0u8; 2 * KEY_LEN];
    salt[..KEY_LEN].copy_from_slice(ephemeral);
    salt[KEY_LEN..].copy_from_slice(recipient);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(HKDF_INFO, &mut okm[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    ChaCha20Poly1305::new_from_slice(&okm[..]).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Encrypt `plaintext` so only the holder of `recipient`'s secret can read it
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<SealedBox> {
    if recipient.algorithm() != KeyAlgorithm::X25519 {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "sealing requires an X25519 key, got {}",
            recipient.algorithm()
        )));
    }
    let ephemeral = KeyPair::generate(KeyAlgorithm::X25519);
    let secret = StaticSecret::from(*ephemeral.private_key().as_bytes());
    let cipher = box_cipher(
        &secret,
        recipient.as_bytes(),
        ephemeral.public_key().as_bytes(),
        recipient.as_bytes(),
    )?;

    let nonce: [u8; NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(SealedBox {
        ephemeral_public: *ephemeral.public_key(),
        nonce,
        ciphertext,
    })
}

/// Open a sealed box with the recipient's X25519 key pair
pub fn open(sealed: &SealedBox, recipient: &KeyPair) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if recipient.algorithm() != KeyAlgorithm::X25519 || sealed.ephemeral_public.algorithm() != KeyAlgorithm::X25519 {
        return Err(CryptoError::UnsupportedAlgorithm("sealed boxes use X25519 keys".to_string()));
    }
    let secret = StaticSecret::from(*recipient.private_key().as_bytes());
    let cipher = box_cipher(
        &secret,
        sealed.ephemeral_public.as_bytes(),
        sealed.ephemeral_public.as_bytes(),
        recipient.public_key().as_bytes(),
    )?;
    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptionFailed)
}
