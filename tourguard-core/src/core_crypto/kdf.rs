//! Password-based key derivation (Argon2id)

use super::errors::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Salt length for Argon2 KDF (16 bytes = 128 bits)
pub const SALT_LEN: usize = 16;

/// Derived key length (AES-256)
pub const KEY_LEN: usize = 32;

/// Hard ceilings on cost parameters read back from an envelope
pub const MAX_KDF_MEMORY_KIB: u32 = 256 * 1024;
pub const MAX_KDF_ITERATIONS: u32 = 16;
pub const MAX_KDF_PARALLELISM: u32 = 8;

/// KDF identifier recorded in envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    Argon2id,
}

/// Fixed cost parameters; they travel with every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: u32,
}

impl Default for KdfParams {
    /// 19 MiB, 2 iterations, 1 lane
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
            output_len: KEY_LEN as u32,
        }
    }
}

impl KdfParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
            ..Self::default()
        }
    }

    /// Largest parameters accepted from an envelope: the hard ceilings,
    /// raised to `configured` wherever it is higher
    pub fn ceiling(configured: &KdfParams) -> Self {
        Self::new(
            configured.memory_kib.max(MAX_KDF_MEMORY_KIB),
            configured.iterations.max(MAX_KDF_ITERATIONS),
            configured.parallelism.max(MAX_KDF_PARALLELISM),
        )
    }

    /// Reject parameters above `limit` before any work is done with them
    pub fn check_within(&self, limit: &KdfParams) -> CryptoResult<()> {
        if self.memory_kib > limit.memory_kib
            || self.iterations > limit.iterations
            || self.parallelism > limit.parallelism
        {
            return Err(CryptoError::KeyDerivation(format!(
                "kdf params m={} t={} p={} exceed limit m={} t={} p={}",
                self.memory_kib, self.iterations, self.parallelism, limit.memory_kib, limit.iterations, limit.parallelism
            )));
        }
        Ok(())
    }

    fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        if self.output_len as usize != KEY_LEN {
            return Err(CryptoError::KeyDerivation(format!(
                "unsupported output length {}",
                self.output_len
            )));
        }
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(KEY_LEN))
            .map_err(|e| CryptoError::KeyDerivation(format!("invalid params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// 256-bit symmetric key; zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    /// Constant-time comparison
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// A key together with the salt and parameters that produced it
#[derive(Clone, Debug)]
pub struct DerivedKey {
    key: SymmetricKey,
    salt: [u8; SALT_LEN],
    params: KdfParams,
}

impl DerivedKey {
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

/// Fresh random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    rand::random()
}

/// Deterministic for fixed (password, salt, params)
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN], params: &KdfParams) -> CryptoResult<DerivedKey> {
    let argon2 = params.argon2()?;
    let mut out = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let key = SymmetricKey::from_bytes(out);
    out.zeroize();
    Ok(DerivedKey {
        key,
        salt: *salt,
        params: *params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams::new(256, 1, 1)
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.memory_kib, 19456);
        assert_eq!(params.iterations, 2);
        assert_eq!(params.parallelism, 1);
        assert_eq!(params.output_len, 32);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key(b"password", &salt, &fast()).unwrap();
        let b = derive_key(b"password", &salt, &fast()).unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_different_salt_or_password_changes_key() {
        let salt = [7u8; SALT_LEN];
        let base = derive_key(b"password", &salt, &fast()).unwrap();
        let other_salt = derive_key(b"password", &[8u8; SALT_LEN], &fast()).unwrap();
        let other_pw = derive_key(b"passw0rd", &salt, &fast()).unwrap();
        assert_ne!(base.key(), other_salt.key());
        assert_ne!(base.key(), other_pw.key());
    }

    #[test]
    fn test_salts_are_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams::new(1, 1, 1);
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_LEN], &params),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_ceiling_keeps_configured_cost() {
        let ceiling = KdfParams::ceiling(&KdfParams::default());
        assert_eq!(ceiling.memory_kib, MAX_KDF_MEMORY_KIB);
        assert_eq!(ceiling.iterations, MAX_KDF_ITERATIONS);

        let heavy = KdfParams::new(MAX_KDF_MEMORY_KIB * 2, 32, 1);
        assert!(heavy.check_within(&KdfParams::ceiling(&heavy)).is_ok());
    }

    #[test]
    fn test_params_above_limit_rejected() {
        let limit = KdfParams::ceiling(&fast());
        assert!(KdfParams::default().check_within(&limit).is_ok());
        for params in [
            KdfParams::new(256, u32::MAX, 1),
            KdfParams::new(u32::MAX, 1, 1),
            KdfParams::new(256, 1, MAX_KDF_PARALLELISM + 1),
        ] {
            assert!(matches!(params.check_within(&limit), Err(CryptoError::KeyDerivation(_))));
        }
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let derived = derive_key(b"pw", &[1u8; SALT_LEN], &fast()).unwrap();
        let debug = format!("{:?}", derived);
        assert!(debug.contains("REDACTED"));
    }
}
