//! File-based keystore
//!
//! One file per identity:
//! ```text
//! [Magic: 8 bytes "TGKS0001"]
//! [Version: 1 byte]
//! [JSON-encoded StoredIdentity]
//! ```
//! The private keys inside are already an AES-256-GCM envelope; this layer only
//! adds framing and atomic replacement.

use super::{Keystore, KeystoreError, StoredIdentity};
use crate::core_crypto::hashing::hash_hex;
use crate::core_identity::Did;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic header for keystore files
const MAGIC_HEADER: &[u8; 8] = b"TGKS0001";

/// Current keystore format version
const FORMAT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 9;
const EXTENSION: &str = "tgks";

pub struct FileKeystore {
    base_path: PathBuf,
}

impl FileKeystore {
    /// Create a new file keystore at the given path
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, KeystoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(FileKeystore { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File name derived from the DID so arbitrary identifiers stay path-safe
    fn identity_path(&self, identifier: &Did) -> PathBuf {
        let mut name = hash_hex(identifier.to_string().as_bytes());
        name.truncate(32);
        self.base_path.join(format!("{}.{}", name, EXTENSION))
    }

    fn encode(entry: &StoredIdentity) -> Result<Vec<u8>, KeystoreError> {
        let json = serde_json::to_vec(entry).map_err(|e| KeystoreError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(HEADER_SIZE + json.len());
        out.extend_from_slice(MAGIC_HEADER);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&json);
        Ok(out)
    }

    fn decode(data: &[u8]) -> Result<StoredIdentity, KeystoreError> {
        if data.len() < HEADER_SIZE {
            return Err(KeystoreError::InvalidFormat("File too short".to_string()));
        }
        if &data[0..8] != MAGIC_HEADER {
            return Err(KeystoreError::InvalidFormat("Invalid magic header".to_string()));
        }
        if data[8] != FORMAT_VERSION {
            return Err(KeystoreError::InvalidFormat(format!("Unsupported version: {}", data[8])));
        }
        serde_json::from_slice(&data[HEADER_SIZE..]).map_err(|e| KeystoreError::Serialization(e.to_string()))
    }

    /// Write file atomically (write to temp, then rename)
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), KeystoreError> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

impl Keystore for FileKeystore {
    fn load(&self, identifier: &Did) -> Result<StoredIdentity, KeystoreError> {
        let path = self.identity_path(identifier);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeystoreError::NotFound(identifier.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let entry = Self::decode(&data)?;
        if &entry.identifier != identifier {
            return Err(KeystoreError::InvalidFormat(format!(
                "{} holds a different identity",
                path.display()
            )));
        }
        Ok(entry)
    }

    fn save(&self, entry: &StoredIdentity) -> Result<(), KeystoreError> {
        let path = self.identity_path(&entry.identifier);
        self.write_atomic(&path, &Self::encode(entry)?)?;
        debug!(did = %entry.identifier, path = %path.display(), "keystore entry written");
        Ok(())
    }

    fn delete(&self, identifier: &Did) -> Result<(), KeystoreError> {
        match fs::remove_file(self.identity_path(identifier)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KeystoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<StoredIdentity>, KeystoreError> {
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.base_path)? {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            entries.push(Self::decode(&fs::read(&path)?)?);
        }
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }
}
