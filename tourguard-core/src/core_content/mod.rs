//! ContentStore: content-addressed storage of opaque blobs
//!
//! Ids are derived from (and verify) the bytes, so `put` is idempotent and
//! `get` detects any mutation behind an id. Off-chain storage is treated as
//! eventually available: blobs that matter must be pinned, and unpinned blobs
//! may disappear after `collect_garbage`.

mod content_id;
pub mod errors;
mod file_store;
mod memory_store;

pub use content_id::{ContentId, StoredBlobRef};
pub use errors::{StorageError, StorageResult};
pub use file_store::FileContentStore;
pub use memory_store::MemoryContentStore;

use async_trait::async_trait;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes and return their content id. Idempotent.
    async fn put(&self, bytes: &[u8]) -> StorageResult<ContentId>;

    /// Fetch and re-verify bytes
    async fn get(&self, id: &ContentId) -> StorageResult<Vec<u8>>;

    /// Request durability for a stored blob
    async fn pin(&self, id: &ContentId) -> StorageResult<()>;

    async fn unpin(&self, id: &ContentId) -> StorageResult<()>;

    async fn contains(&self, id: &ContentId) -> StorageResult<bool>;

    /// Remove unpinned blobs; returns the number removed
    async fn collect_garbage(&self) -> StorageResult<usize>;
}
