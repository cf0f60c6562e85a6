//! Fault-injecting ledger
//!
//! Wraps an [`InMemoryLedger`] and fails a configurable number of upcoming
//! writes or reads.

use crate::core_identity::{Did, DidDocument};
use crate::core_ledger::{
    DidRecord, InMemoryLedger, LedgerClient, LedgerError, LedgerResult, RegisterDidRequest, RegisterRevocationRequest,
    RevocationRecord, RevocationSlot, RevokeRequest, TxHash, TxReceipt,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum FaultMode {
    /// Reject without touching the ledger
    Reject(LedgerError),
    /// Apply the write, then report a network error (lost response)
    ApplyThenFail,
}

#[derive(Default)]
struct Faults {
    writes: Vec<FaultMode>,
    reads: u32,
}

pub struct FaultyLedger {
    inner: Arc<InMemoryLedger>,
    faults: Mutex<Faults>,
}

impl FaultyLedger {
    pub fn new(inner: Arc<InMemoryLedger>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryLedger> {
        &self.inner
    }

    /// Fail the next `count` writes with `mode`
    pub fn fail_next_writes(&self, mode: FaultMode, count: usize) {
        let mut faults = self.faults.lock().unwrap();
        faults.writes.extend(std::iter::repeat(mode).take(count));
    }

    /// Fail the next `count` revocation status reads with a network error
    pub fn fail_next_reads(&self, count: u32) {
        self.faults.lock().unwrap().reads += count;
    }

    fn next_write_fault(&self) -> Option<FaultMode> {
        let mut faults = self.faults.lock().unwrap();
        if faults.writes.is_empty() {
            None
        } else {
            Some(faults.writes.remove(0))
        }
    }

    fn read_fault(&self) -> LedgerResult<()> {
        let mut faults = self.faults.lock().unwrap();
        if faults.reads > 0 {
            faults.reads -= 1;
            return Err(LedgerError::NetworkError("injected read failure".to_string()));
        }
        Ok(())
    }

    async fn write<T>(&self, op: impl std::future::Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        match self.next_write_fault() {
            None => op.await,
            Some(FaultMode::Reject(err)) => Err(err),
            Some(FaultMode::ApplyThenFail) => {
                op.await?;
                Err(LedgerError::NetworkError("injected lost response".to_string()))
            }
        }
    }
}

#[async_trait]
impl LedgerClient for FaultyLedger {
    async fn register_did(&self, request: RegisterDidRequest) -> LedgerResult<TxReceipt> {
        self.write(self.inner.register_did(request)).await
    }

    async fn resolve_did(&self, did: &Did) -> LedgerResult<DidDocument> {
        self.inner.resolve_did(did).await
    }

    async fn did_record(&self, did: &Did) -> LedgerResult<Option<DidRecord>> {
        self.inner.did_record(did).await
    }

    async fn register_revocation_entry(&self, request: RegisterRevocationRequest) -> LedgerResult<RevocationSlot> {
        self.write(self.inner.register_revocation_entry(request)).await
    }

    async fn revoke(&self, request: RevokeRequest) -> LedgerResult<TxReceipt> {
        self.write(self.inner.revoke(request)).await
    }

    async fn is_revoked(&self, credential_id: &str) -> LedgerResult<bool> {
        self.read_fault()?;
        self.inner.is_revoked(credential_id).await
    }

    async fn revocation_record(&self, credential_id: &str) -> LedgerResult<Option<RevocationRecord>> {
        self.inner.revocation_record(credential_id).await
    }

    async fn current_block(&self) -> LedgerResult<u64> {
        self.inner.current_block().await
    }

    async fn transaction(&self, tx_hash: &TxHash) -> LedgerResult<Option<TxReceipt>> {
        self.inner.transaction(tx_hash).await
    }
}
