//! BLAKE3 hashing helpers

/// Digest length in bytes
pub const HASH_LEN: usize = 32;

/// Hash arbitrary bytes with BLAKE3-256
pub fn hash(data: &[u8]) -> [u8; HASH_LEN] {
    *blake3::hash(data).as_bytes()
}

/// Lowercase hex BLAKE3 digest
pub fn hash_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
