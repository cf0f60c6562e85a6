//! In-memory content store

use super::content_id::ContentId;
use super::errors::{StorageError, StorageResult};
use super::ContentStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

#[derive(Debug)]
struct Entry {
    bytes: Arc<Vec<u8>>,
    pinned: bool,
}

/// Map-backed store with pinning, garbage collection and an offline switch
/// for exercising `Unavailable` handling
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    entries: RwLock<HashMap<ContentId, Entry>>,
    offline: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (every call fails with `Unavailable`)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite stored bytes without updating the id (corruption tests)
    #[cfg(test)]
    pub(crate) fn tamper(&self, id: &ContentId, bytes: Vec<u8>) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get_mut(id) {
                entry.bytes = Arc::new(bytes);
            }
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: &[u8]) -> StorageResult<ContentId> {
        self.check_online()?;
        let id = ContentId::for_bytes(bytes);
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let entry = entries.entry(id.clone()).or_insert_with(|| Entry {
            bytes: Arc::new(bytes.to_vec()),
            pinned: false,
        });
        if !id.verifies(&entry.bytes) {
            warn!(content_id = %id, "replacing corrupted blob");
            entry.bytes = Arc::new(bytes.to_vec());
        }
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> StorageResult<Vec<u8>> {
        self.check_online()?;
        let bytes = {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            entries
                .get(id)
                .map(|e| e.bytes.clone())
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?
        };
        if !id.verifies(&bytes) {
            return Err(StorageError::Corrupted(id.to_string()));
        }
        Ok(bytes.as_ref().clone())
    }

    async fn pin(&self, id: &ContentId) -> StorageResult<()> {
        self.check_online()?;
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        entry.pinned = true;
        Ok(())
    }

    async fn unpin(&self, id: &ContentId) -> StorageResult<()> {
        self.check_online()?;
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            entry.pinned = false;
        }
        Ok(())
    }

    async fn contains(&self, id: &ContentId) -> StorageResult<bool> {
        self.check_online()?;
        Ok(self
            .entries
            .read()
            .map(|e| e.contains_key(id))
            .unwrap_or(false))
    }

    async fn collect_garbage(&self) -> StorageResult<usize> {
        self.check_online()?;
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let before = entries.len();
        entries.retain(|_, e| e.pinned);
        Ok(before - entries.len())
    }
}
