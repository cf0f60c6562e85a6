//! Filesystem content store
//!
//! Layout:
//! ```text
//! <base>/blobs/<2-char shard>/<content id>
//! <base>/pins/<content id>          (empty marker file)
//! ```
//! Blobs are written to a temp file and renamed into place.

use super::content_id::ContentId;
use super::errors::{StorageError, StorageResult};
use super::ContentStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

pub struct FileContentStore {
    base_path: PathBuf,
}

impl FileContentStore {
    /// Open (creating if needed) a store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(base_path.join("blobs"))?;
        std::fs::create_dir_all(base_path.join("pins"))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, id: &ContentId) -> PathBuf {
        let encoded = id.as_str();
        let shard = &encoded[encoded.len() - 2..];
        self.base_path.join("blobs").join(shard).join(encoded)
    }

    fn pin_path(&self, id: &ContentId) -> PathBuf {
        self.base_path.join("pins").join(id.as_str())
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

fn not_found_or_unavailable(err: std::io::Error, id: &ContentId) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(id.to_string())
    } else {
        StorageError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn put(&self, bytes: &[u8]) -> StorageResult<ContentId> {
        let id = ContentId::for_bytes(bytes);
        let path = self.blob_path(&id);
        // an existing blob is only reused if it still hashes to the id
        match fs::read(&path).await {
            Ok(existing) if id.verifies(&existing) => return Ok(id),
            Ok(_) => warn!(content_id = %id, "replacing corrupted blob"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Self::write_atomic(&path, bytes).await?;
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> StorageResult<Vec<u8>> {
        let bytes = fs::read(self.blob_path(id))
            .await
            .map_err(|e| not_found_or_unavailable(e, id))?;
        if !id.verifies(&bytes) {
            return Err(StorageError::Corrupted(id.to_string()));
        }
        Ok(bytes)
    }

    async fn pin(&self, id: &ContentId) -> StorageResult<()> {
        if !fs::try_exists(self.blob_path(id)).await? {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Self::write_atomic(&self.pin_path(id), &[]).await
    }

    async fn unpin(&self, id: &ContentId) -> StorageResult<()> {
        match fs::remove_file(self.pin_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, id: &ContentId) -> StorageResult<bool> {
        Ok(fs::try_exists(self.blob_path(id)).await?)
    }

    async fn collect_garbage(&self) -> StorageResult<usize> {
        let mut removed = 0;
        let mut shards = fs::read_dir(self.base_path.join("blobs")).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut blobs = fs::read_dir(shard.path()).await?;
            while let Some(blob) = blobs.next_entry().await? {
                let name = blob.file_name();
                let Some(name) = name.to_str() else { continue };
                // stray temp files and foreign names are left alone
                let Ok(id) = ContentId::parse(name) else { continue };
                if !fs::try_exists(self.pin_path(&id)).await? {
                    fs::remove_file(blob.path()).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
