//! CryptoService: key pairs, password-based key derivation, authenticated
//! encryption, signatures and hashing
//!
//! Key derivation is intentionally expensive; the `*_async` variants move it
//! onto tokio's blocking pool so callers on an async runtime never stall.

pub mod encoding;
pub mod envelope;
pub mod errors;
pub mod hashing;
pub mod kdf;
pub mod keypair;
pub mod sealed;

pub use envelope::EncryptedEnvelope;
pub use errors::{CryptoError, CryptoResult};
pub use hashing::hash;
pub use kdf::{DerivedKey, KdfParams, SymmetricKey, SALT_LEN};
pub use keypair::{KeyAlgorithm, KeyPair, PrivateKey, PublicKey, Signature};
pub use sealed::SealedBox;

use crate::config::CryptoConfig;
use crate::metrics::Timer;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Stateless crypto facade carrying the fixed KDF cost parameters
#[derive(Debug, Clone, Default)]
pub struct CryptoService {
    kdf_params: KdfParams,
}

impl CryptoService {
    pub fn new(kdf_params: KdfParams) -> Self {
        Self { kdf_params }
    }

    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(KdfParams::new(
            config.kdf_memory_kib,
            config.kdf_iterations,
            config.kdf_parallelism,
        ))
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf_params
    }

    /// Ed25519 key pair for DID control and signing
    pub fn generate_key_pair(&self) -> KeyPair {
        KeyPair::generate(KeyAlgorithm::Ed25519)
    }

    /// X25519 key pair for sealed-box key agreement
    pub fn generate_agreement_key_pair(&self) -> KeyPair {
        KeyPair::generate(KeyAlgorithm::X25519)
    }

    /// Derive with this service's parameters. Blocks the calling thread.
    pub fn derive_key(&self, password: &SecretString, salt: &[u8; SALT_LEN]) -> CryptoResult<DerivedKey> {
        derive_timed(password.expose_secret().as_bytes(), salt, &self.kdf_params)
    }

    /// Derive on the blocking pool with explicit parameters
    pub async fn derive_key_with(
        &self,
        password: &SecretString,
        salt: [u8; SALT_LEN],
        params: KdfParams,
    ) -> CryptoResult<DerivedKey> {
        let password = Zeroizing::new(password.expose_secret().as_bytes().to_vec());
        tokio::task::spawn_blocking(move || derive_timed(&password, &salt, &params))
            .await
            .map_err(|e| CryptoError::TaskFailed(e.to_string()))?
    }

    /// Derive with a fresh random salt
    pub async fn derive_fresh_key(&self, password: &SecretString) -> CryptoResult<DerivedKey> {
        self.derive_key_with(password, kdf::generate_salt(), self.kdf_params).await
    }

    /// Re-derive the key an envelope was sealed under, from its own
    /// salt/params. Parameters above [`KdfParams::ceiling`] are rejected
    /// without running the KDF.
    pub async fn derive_envelope_key(
        &self,
        password: &SecretString,
        envelope: &EncryptedEnvelope,
    ) -> CryptoResult<DerivedKey> {
        envelope
            .kdf_params
            .check_within(&KdfParams::ceiling(&self.kdf_params))?;
        self.derive_key_with(password, envelope.salt, envelope.kdf_params).await
    }

    pub fn encrypt(&self, plaintext: &[u8], key: &DerivedKey) -> CryptoResult<EncryptedEnvelope> {
        envelope::encrypt(plaintext, key)
    }

    pub fn decrypt(&self, envelope: &EncryptedEnvelope, key: &DerivedKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
        envelope::decrypt(envelope, key)
    }

    /// Fresh salt + encrypt in one step
    pub async fn encrypt_with_password(
        &self,
        plaintext: &[u8],
        password: &SecretString,
    ) -> CryptoResult<EncryptedEnvelope> {
        let key = self.derive_fresh_key(password).await?;
        self.encrypt(plaintext, &key)
    }

    pub async fn decrypt_with_password(
        &self,
        envelope: &EncryptedEnvelope,
        password: &SecretString,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let key = self.derive_envelope_key(password, envelope).await?;
        self.decrypt(envelope, &key)
    }

    pub fn sign(&self, message: &[u8], key_pair: &KeyPair) -> CryptoResult<Signature> {
        key_pair.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
        public_key.verify(message, signature)
    }

    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        hashing::hash(data)
    }

    pub fn seal(&self, plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<SealedBox> {
        sealed::seal(plaintext, recipient)
    }

    pub fn open(&self, sealed: &SealedBox, recipient: &KeyPair) -> CryptoResult<Zeroizing<Vec<u8>>> {
        sealed::open(sealed, recipient)
    }
}

fn derive_timed(password: &[u8], salt: &[u8; SALT_LEN], params: &KdfParams) -> CryptoResult<DerivedKey> {
    let timer = Timer::new("crypto.kdf.duration_ms");
    let result = kdf::derive_key(password, salt, params);
    timer.stop();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CryptoService {
        CryptoService::new(KdfParams::new(256, 1, 1))
    }

    fn pw(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[tokio::test]
    async fn test_password_roundtrip() {
        let crypto = service();
        let env = crypto.encrypt_with_password(b"kyc", &pw("p2")).await.unwrap();
        let plain = crypto.decrypt_with_password(&env, &pw("p2")).await.unwrap();
        assert_eq!(plain.as_slice(), b"kyc");
    }

    #[tokio::test]
    async fn test_wrong_password_is_decryption_failed() {
        let crypto = service();
        let env = crypto.encrypt_with_password(b"kyc", &pw("p2")).await.unwrap();
        let err = crypto.decrypt_with_password(&env, &pw("p3")).await.unwrap_err();
        assert_eq!(err, CryptoError::DecryptionFailed);
    }

    #[tokio::test]
    async fn test_async_and_sync_derivation_agree() {
        let crypto = service();
        let salt = [4u8; SALT_LEN];
        let sync = crypto.derive_key(&pw("same"), &salt).unwrap();
        let asynced = crypto.derive_key_with(&pw("same"), salt, *crypto.kdf_params()).await.unwrap();
        assert_eq!(sync.key(), asynced.key());
    }

    #[tokio::test]
    async fn test_decrypt_uses_envelope_params() {
        let writer = CryptoService::new(KdfParams::new(512, 2, 1));
        let reader = service();
        let env = writer.encrypt_with_password(b"payload", &pw("pw")).await.unwrap();
        let plain = reader.decrypt_with_password(&env, &pw("pw")).await.unwrap();
        assert_eq!(plain.as_slice(), b"payload");
    }

    #[tokio::test]
    async fn test_oversized_envelope_params_rejected_before_derivation() {
        let crypto = service();
        let mut env = crypto.encrypt_with_password(b"payload", &pw("pw")).await.unwrap();
        env.kdf_params.iterations = u32::MAX;
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            crypto.decrypt_with_password(&env, &pw("pw")),
        )
        .await
        .expect("derivation must not run");
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));

        env.kdf_params.iterations = 1;
        env.kdf_params.memory_kib = u32::MAX;
        assert!(matches!(
            crypto.decrypt_with_password(&env, &pw("pw")).await,
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_generated_key_algorithms() {
        let crypto = service();
        assert_eq!(crypto.generate_key_pair().algorithm(), KeyAlgorithm::Ed25519);
        assert_eq!(crypto.generate_agreement_key_pair().algorithm(), KeyAlgorithm::X25519);
    }

    #[test]
    fn test_sign_verify_through_service() {
        let crypto = service();
        let kp = crypto.generate_key_pair();
        let sig = crypto.sign(b"message", &kp).unwrap();
        assert!(crypto.verify(b"message", &sig, kp.public_key()));
    }
}
