//! In-process append-only ledger
//!
//! Every accepted write mines exactly one block. The registry enforces the
//! same authorization rules a contract would: signatures over typed payloads,
//! first registration bound to the DID address, updates only by the current
//! controller, one revocation slot per credential, revocation only by the
//! issuer's current controller.

use super::errors::{LedgerError, LedgerResult};
use super::types::{
    DidRecord, RegisterDidRequest, RegisterRevocationRequest, RevocationRecord, RevocationSlot,
    RevokeRequest, TxHash, TxReceipt,
};
use super::LedgerClient;
use crate::core_crypto::{PublicKey, Signature};
use crate::core_identity::{Did, DidDocument};
use crate::metrics::{record_counter, LEDGER_WRITES};
use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Serializable ledger state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub block_height: u64,
    pub dids: BTreeMap<String, DidRecord>,
    pub revocations: BTreeMap<String, RevocationRecord>,
    pub list_counters: BTreeMap<String, u64>,
    pub transactions: BTreeMap<String, TxReceipt>,
}

impl LedgerSnapshot {
    fn mine(&mut self, payload: &[u8]) -> TxReceipt {
        self.block_height += 1;
        let receipt = TxReceipt {
            tx_hash: TxHash::compute(self.block_height, payload),
            block_number: self.block_height,
        };
        self.transactions.insert(receipt.tx_hash.0.clone(), receipt.clone());
        record_counter(LEDGER_WRITES, 1);
        receipt
    }

    fn current_controller(&self, did: &Did) -> LedgerResult<&PublicKey> {
        self.dids
            .get(&did.to_string())
            .map(|r| &r.controller)
            .ok_or_else(|| LedgerError::NotFound(did.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerSnapshot>,
}

fn check_signature(signer: &PublicKey, payload: &[u8], signature: &Signature) -> LedgerResult<()> {
    if signer.verify(payload, signature) {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized("invalid signature".to_string()))
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerSnapshot> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state().clone()
    }

    /// Advance the chain with empty blocks
    pub fn mine_blocks(&self, count: u64) {
        self.state().block_height += count;
    }

    /// Load a JSON snapshot, or start empty when the file does not exist
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => {
                let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes).map_err(std::io::Error::other)?;
                Ok(Self::from_snapshot(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&self.snapshot()).map_err(std::io::Error::other)?;
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(temp_path, path)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn register_did(&self, request: RegisterDidRequest) -> LedgerResult<TxReceipt> {
        if request.document.id != request.did {
            return Err(LedgerError::InvalidRequest("document id does not match DID".to_string()));
        }
        if request.document.hash() != request.document_hash {
            return Err(LedgerError::InvalidRequest("document hash mismatch".to_string()));
        }
        let Some(new_controller) = request.document.controller_key().copied() else {
            return Err(LedgerError::InvalidRequest("document has no controller key".to_string()));
        };
        let payload = request.signing_payload();
        check_signature(&request.signer, &payload, &request.signature)?;

        let key = request.did.to_string();
        let mut state = self.state();
        let registered_in = match state.dids.get(&key) {
            None => {
                if !request.did.is_derived_from(&request.signer) || new_controller != request.signer {
                    warn!(did = %request.did, "first registration not signed by the DID's own key");
                    return Err(LedgerError::Unauthorized(
                        "signer does not control this DID".to_string(),
                    ));
                }
                None
            }
            Some(existing) if existing.controller != request.signer => {
                return Err(LedgerError::AlreadyRegistered(key));
            }
            Some(existing) => Some(existing.registered_in.clone()),
        };

        let receipt = state.mine(&payload);
        let record = DidRecord {
            document: request.document,
            document_hash: request.document_hash,
            controller: new_controller,
            registered_in: registered_in.unwrap_or_else(|| receipt.clone()),
            updated_in: receipt.clone(),
        };
        state.dids.insert(key, record);
        info!(did = %request.did, block = receipt.block_number, "DID document anchored");
        Ok(receipt)
    }

    async fn resolve_did(&self, did: &Did) -> LedgerResult<DidDocument> {
        self.state()
            .dids
            .get(&did.to_string())
            .map(|r| r.document.clone())
            .ok_or_else(|| LedgerError::NotFound(did.to_string()))
    }

    async fn did_record(&self, did: &Did) -> LedgerResult<Option<DidRecord>> {
        Ok(self.state().dids.get(&did.to_string()).cloned())
    }

    async fn register_revocation_entry(&self, request: RegisterRevocationRequest) -> LedgerResult<RevocationSlot> {
        let payload = request.signing_payload();
        check_signature(&request.signer, &payload, &request.signature)?;

        let mut state = self.state();
        if *state.current_controller(&request.issuer)? != request.signer {
            return Err(LedgerError::Unauthorized(format!(
                "signer is not the controller of {}",
                request.issuer
            )));
        }
        if state.revocations.contains_key(&request.credential_id) {
            return Err(LedgerError::DuplicateEntry(request.credential_id));
        }

        let counter = state.list_counters.entry(request.list_id.clone()).or_insert(0);
        let index = *counter;
        *counter += 1;

        let receipt = state.mine(&payload);
        state.revocations.insert(
            request.credential_id.clone(),
            RevocationRecord {
                credential_id: request.credential_id.clone(),
                list_id: request.list_id.clone(),
                index,
                revoked: false,
                revoked_at: None,
                reason: None,
                issuer: request.issuer,
                allocated_in: receipt.clone(),
                revoked_in: None,
            },
        );
        debug!(credential_id = %request.credential_id, list_id = %request.list_id, index, "revocation slot allocated");
        Ok(RevocationSlot {
            list_id: request.list_id,
            index,
            receipt,
        })
    }

    async fn revoke(&self, request: RevokeRequest) -> LedgerResult<TxReceipt> {
        let payload = request.signing_payload();
        check_signature(&request.signer, &payload, &request.signature)?;

        let mut state = self.state();
        let issuer = state
            .revocations
            .get(&request.credential_id)
            .map(|r| r.issuer.clone())
            .ok_or_else(|| LedgerError::NotFound(request.credential_id.clone()))?;
        if *state.current_controller(&issuer)? != request.signer {
            return Err(LedgerError::Unauthorized("only the issuer may revoke".to_string()));
        }
        if state.revocations.get(&request.credential_id).is_some_and(|r| r.revoked) {
            return Err(LedgerError::AlreadyRevoked(request.credential_id));
        }

        let receipt = state.mine(&payload);
        if let Some(record) = state.revocations.get_mut(&request.credential_id) {
            record.revoked = true;
            record.revoked_at = Some(Utc::now().trunc_subsecs(0));
            record.reason = Some(request.reason);
            record.revoked_in = Some(receipt.clone());
        }
        info!(credential_id = %request.credential_id, block = receipt.block_number, "credential revoked");
        Ok(receipt)
    }

    async fn is_revoked(&self, credential_id: &str) -> LedgerResult<bool> {
        self.state()
            .revocations
            .get(credential_id)
            .map(|r| r.revoked)
            .ok_or_else(|| LedgerError::NotFound(credential_id.to_string()))
    }

    async fn revocation_record(&self, credential_id: &str) -> LedgerResult<Option<RevocationRecord>> {
        Ok(self.state().revocations.get(credential_id).cloned())
    }

    async fn current_block(&self) -> LedgerResult<u64> {
        Ok(self.state().block_height)
    }

    async fn transaction(&self, tx_hash: &TxHash) -> LedgerResult<Option<TxReceipt>> {
        Ok(self.state().transactions.get(&tx_hash.0).cloned())
    }
}
