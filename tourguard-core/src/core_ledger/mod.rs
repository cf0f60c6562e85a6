//! LedgerClient: narrow, strongly typed interface to the external ledger
//!
//! DID documents are keyed by `did:<method>:<network>:<address>` and
//! revocation entries by `(listId, index)`. Every write returns a
//! [`TxReceipt`]; waiting for confirmations and safe retries live in
//! [`retry`] because they are caller policy.

pub mod errors;
mod memory_ledger;
pub mod retry;
pub mod types;

pub use errors::{LedgerError, LedgerResult};
pub use memory_ledger::{InMemoryLedger, LedgerSnapshot};
pub use retry::RetryPolicy;
pub use types::{
    DidRecord, RegisterDidRequest, RegisterRevocationRequest, RevocationRecord, RevocationSlot,
    RevokeRequest, TxHash, TxReceipt,
};

use crate::core_identity::{Did, DidDocument};
use async_trait::async_trait;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Register a DID document, or update it when signed by the current controller
    async fn register_did(&self, request: RegisterDidRequest) -> LedgerResult<TxReceipt>;

    async fn resolve_did(&self, did: &Did) -> LedgerResult<DidDocument>;

    /// Full registry record, `None` when the DID is unknown
    async fn did_record(&self, did: &Did) -> LedgerResult<Option<DidRecord>>;

    /// Allocate a revocation slot; unique per credential id
    async fn register_revocation_entry(&self, request: RegisterRevocationRequest) -> LedgerResult<RevocationSlot>;

    async fn revoke(&self, request: RevokeRequest) -> LedgerResult<TxReceipt>;

    /// `NotFound` when no entry was ever allocated for the credential
    async fn is_revoked(&self, credential_id: &str) -> LedgerResult<bool>;

    async fn revocation_record(&self, credential_id: &str) -> LedgerResult<Option<RevocationRecord>>;

    /// Height of the latest block
    async fn current_block(&self) -> LedgerResult<u64>;

    /// Look up a submitted transaction
    async fn transaction(&self, tx_hash: &TxHash) -> LedgerResult<Option<TxReceipt>>;
}
