//! IdentityManager: creation, custody, loading and resolution of DIDs

pub mod did;
pub mod document;
pub mod errors;
mod identity;
pub mod keystore;
mod manager;

pub use did::Did;
pub use document::{DidDocument, ServiceEndpoint, VerificationMethod};
pub use errors::{IdentityError, IdentityResult};
pub use identity::{Identity, IdentityState, UnlockedIdentity};
pub use keystore::{FileKeystore, Keystore, KeystoreError, MemoryKeystore, StoredIdentity};
pub use manager::{IdentityBackup, IdentityManager};
