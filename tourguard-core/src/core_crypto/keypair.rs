//! Key pairs for DID control (Ed25519) and key agreement (X25519)
//!
//! Public keys are exchanged as multibase strings with a multicodec prefix
//! (`0xed01` Ed25519, `0xec01` X25519) so the algorithm travels with the key.
//! Private keys are zeroized on drop and never serialized in the clear outside
//! of the identity secrets blob, which is itself encrypted at rest.

use super::encoding::{decode_multibase, encode_multibase};
use super::errors::{CryptoError, CryptoResult};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

const ED25519_CODEC: [u8; 2] = [0xed, 0x01];
const X25519_CODEC: [u8; 2] = [0xec, 0x01];

/// Asymmetric algorithms supported by the subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// Signatures (DID control, credential proofs)
    #[serde(rename = "Ed25519VerificationKey2020")]
    Ed25519,
    /// Diffie-Hellman key agreement (sealed boxes)
    #[serde(rename = "X25519KeyAgreementKey2020")]
    X25519,
}

impl KeyAlgorithm {
    /// Verification method type name used in DID documents
    pub fn method_type(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "Ed25519VerificationKey2020",
            KeyAlgorithm::X25519 => "X25519KeyAgreementKey2020",
        }
    }

    fn codec(&self) -> [u8; 2] {
        match self {
            KeyAlgorithm::Ed25519 => ED25519_CODEC,
            KeyAlgorithm::X25519 => X25519_CODEC,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_type())
    }
}

/// Public key bytes tagged with their algorithm
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    bytes: [u8; KEY_LEN],
}

impl PublicKey {
    pub fn new(algorithm: KeyAlgorithm, bytes: [u8; KEY_LEN]) -> Self {
        Self { algorithm, bytes }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Multibase form: `z` + base58btc(multicodec ‖ key)
    pub fn to_multibase(&self) -> String {
        let mut tagged = Vec::with_capacity(2 + KEY_LEN);
        tagged.extend_from_slice(&self.algorithm.codec());
        tagged.extend_from_slice(&self.bytes);
        encode_multibase(&tagged)
    }

    pub fn from_multibase(value: &str) -> CryptoResult<Self> {
        let tagged = decode_multibase(value)?;
        if tagged.len() != 2 + KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                2 + KEY_LEN,
                tagged.len()
            )));
        }
        let algorithm = match [tagged[0], tagged[1]] {
            ED25519_CODEC => KeyAlgorithm::Ed25519,
            X25519_CODEC => KeyAlgorithm::X25519,
            other => {
                return Err(CryptoError::UnsupportedAlgorithm(format!(
                    "multicodec {:02x}{:02x}",
                    other[0], other[1]
                )))
            }
        };
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&tagged[2..]);
        Ok(Self { algorithm, bytes })
    }

    /// Check an Ed25519 signature. Any malformed input simply yields `false`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        if self.algorithm != KeyAlgorithm::Ed25519 {
            return false;
        }
        let Ok(key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}, {})", self.algorithm, self.to_multibase())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_multibase())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_multibase())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(d)?;
        PublicKey::from_multibase(&encoded).map_err(D::Error::custom)
    }
}

/// Secret key bytes; zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct PrivateKey {
    #[zeroize(skip)]
    algorithm: KeyAlgorithm,
    bytes: [u8; KEY_LEN],
}

impl PrivateKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Recompute the matching public key
    pub fn public_key(&self) -> PublicKey {
        let bytes = match self.algorithm {
            KeyAlgorithm::Ed25519 => SigningKey::from_bytes(&self.bytes).verifying_key().to_bytes(),
            KeyAlgorithm::X25519 => {
                let secret = x25519_dalek::StaticSecret::from(self.bytes);
                x25519_dalek::PublicKey::from(&secret).to_bytes()
            }
        };
        PublicKey::new(self.algorithm, bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, [REDACTED])", self.algorithm)
    }
}

/// Detached Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "super::encoding::multibase_array")] pub [u8; SIGNATURE_LEN]);

impl Signature {
    pub fn to_multibase(&self) -> String {
        encode_multibase(&self.0)
    }

    pub fn from_multibase(value: &str) -> CryptoResult<Self> {
        let bytes = decode_multibase(value)?;
        let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::Encoding(format!("signature must be {} bytes, got {}", SIGNATURE_LEN, v.len()))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(&self.0[..8]))
    }
}

/// Public/private key pair
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    /// Generate a fresh key pair from OS randomness
    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        let seed: [u8; KEY_LEN] = rand::random();
        let private = PrivateKey { algorithm, bytes: seed };
        let public = private.public_key();
        Self { public, private }
    }

    /// Rebuild a key pair from stored private key material
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { public, private }
    }

    pub fn from_secret_bytes(algorithm: KeyAlgorithm, bytes: [u8; KEY_LEN]) -> Self {
        Self::from_private(PrivateKey { algorithm, bytes })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.public.algorithm
    }

    /// Sign a message; only valid for Ed25519 key pairs
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        if self.algorithm() != KeyAlgorithm::Ed25519 {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} keys cannot sign",
                self.algorithm()
            )));
        }
        let signing_key = SigningKey::from_bytes(&self.private.bytes);
        Ok(Signature(signing_key.sign(message).to_bytes()))
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.public.verify(message, signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}
