//! IdentityManager: DID lifecycle
//!
//! `Uninitialized → Created → Registered → Loaded ⇄ Locked`
//!
//! Private keys are encrypted under a password-derived key and kept only in
//! the local keystore; they are never uploaded, not even encrypted. Mutations
//! of one identifier's envelope are serialized with a per-identifier lock.

use super::did::Did;
use super::document::DidDocument;
use super::errors::{IdentityError, IdentityResult};
use super::identity::{Identity, IdentitySecrets, IdentityState, UnlockedIdentity};
use super::keystore::{Keystore, KeystoreError, StoredIdentity};
use crate::config::LedgerConfig;
use crate::core_crypto::{CryptoError, CryptoService, EncryptedEnvelope, KeyPair};
use crate::core_ledger::retry::{confirm, submit_with_status_check};
use crate::core_ledger::{LedgerClient, RegisterDidRequest, RetryPolicy, TxReceipt};
use crate::logging::fingerprint;
use crate::metrics::{record_counter, IDENTITY_CREATED, IDENTITY_UNLOCK_FAILED, IDENTITY_UNLOCK_SUCCESS};
use crate::sync::KeyedLocks;
use chrono::{SubsecRound, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Portable copy of a keystore entry; the keys inside stay encrypted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityBackup {
    pub identifier: Did,
    pub alias: String,
    pub document: DidDocument,
    pub envelope: EncryptedEnvelope,
}

pub struct IdentityManager {
    crypto: CryptoService,
    ledger: Arc<dyn LedgerClient>,
    keystore: Arc<dyn Keystore>,
    did_method: String,
    network: String,
    retry: RetryPolicy,
    states: RwLock<HashMap<Did, IdentityState>>,
    locks: KeyedLocks<Did>,
    alias_lock: Mutex<()>,
}

fn map_unlock_error(err: CryptoError) -> IdentityError {
    match err {
        CryptoError::DecryptionFailed => IdentityError::DecryptionFailed,
        other => IdentityError::Crypto(other),
    }
}

fn map_keystore_error(err: KeystoreError) -> IdentityError {
    match err {
        KeystoreError::NotFound(id) => IdentityError::NotFound(id),
        other => IdentityError::Keystore(other),
    }
}

impl IdentityManager {
    pub fn new(
        crypto: CryptoService,
        ledger: Arc<dyn LedgerClient>,
        keystore: Arc<dyn Keystore>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            crypto,
            ledger,
            keystore,
            did_method: config.did_method.clone(),
            network: config.network.clone(),
            retry: RetryPolicy::from_config(config),
            states: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
            alias_lock: Mutex::new(()),
        }
    }

    /// Override retry/confirmation policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn crypto(&self) -> &CryptoService {
        &self.crypto
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn set_state(&self, identifier: &Did, state: IdentityState) {
        let mut states = self.states.write().unwrap_or_else(|p| p.into_inner());
        if state == IdentityState::Uninitialized {
            states.remove(identifier);
        } else {
            states.insert(identifier.clone(), state);
        }
    }

    /// Current lifecycle state. Identities persisted by an earlier process
    /// report `Registered` until loaded.
    pub fn state(&self, identifier: &Did) -> IdentityState {
        let known = self
            .states
            .read()
            .ok()
            .and_then(|s| s.get(identifier).copied());
        match known {
            Some(state) => state,
            None if self.keystore.contains(identifier).unwrap_or(false) => IdentityState::Registered,
            None => IdentityState::Uninitialized,
        }
    }

    /// Submit a DID document write, then wait for confirmations
    async fn anchor(&self, document: &DidDocument, controller: &KeyPair) -> IdentityResult<TxReceipt> {
        let request = RegisterDidRequest::signed(document.clone(), controller)?;
        let did = document.id.clone();
        let document_hash = request.document_hash;
        let ledger = self.ledger.clone();

        let receipt = submit_with_status_check(
            &self.retry,
            "register_did",
            || {
                let ledger = ledger.clone();
                let did = did.clone();
                async move {
                    Ok(ledger
                        .did_record(&did)
                        .await?
                        .filter(|r| r.document_hash == document_hash)
                        .map(|r| r.updated_in))
                }
            },
            || {
                let ledger = ledger.clone();
                let request = request.clone();
                async move { ledger.register_did(request).await }
            },
        )
        .await?;

        confirm(self.ledger.as_ref(), &receipt, &self.retry).await?;
        Ok(receipt)
    }

    async fn seal_secrets(
        &self,
        signing: &KeyPair,
        agreement: &KeyPair,
        generation: u32,
        password: &SecretString,
    ) -> IdentityResult<(EncryptedEnvelope, crate::core_crypto::DerivedKey)> {
        let secrets = IdentitySecrets {
            signing: signing.private_key().clone(),
            agreement: agreement.private_key().clone(),
            generation,
        };
        let key = self.crypto.derive_fresh_key(password).await?;
        let envelope = self.crypto.encrypt(&secrets.to_bytes()?, &key)?;
        Ok((envelope, key))
    }

    /// Generate keys, anchor the DID document and store the encrypted keys locally
    #[instrument(skip_all, fields(alias = %alias))]
    pub async fn create(&self, alias: &str, password: &SecretString) -> IdentityResult<Identity> {
        let _alias_guard = self.alias_lock.lock().await;
        if self.keystore.find_by_alias(alias)?.is_some() {
            return Err(IdentityError::AliasInUse(alias.to_string()));
        }

        let signing = self.crypto.generate_key_pair();
        let agreement = self.crypto.generate_agreement_key_pair();
        let did = Did::from_public_key(&self.did_method, &self.network, signing.public_key());
        let document = DidDocument::new(&did, signing.public_key(), agreement.public_key(), 1);
        self.set_state(&did, IdentityState::Created);
        debug!(did = %did, key = %fingerprint(signing.public_key().as_bytes()), "keys generated");

        let _guard = self.locks.lock(&did).await;
        let result = async {
            let (envelope, _) = self.seal_secrets(&signing, &agreement, 1, password).await?;
            let receipt = self.anchor(&document, &signing).await?;

            let now = Utc::now().trunc_subsecs(0);
            self.keystore.save(&StoredIdentity {
                identifier: did.clone(),
                alias: alias.to_string(),
                document: document.clone(),
                envelope,
                created_at: now,
                updated_at: now,
            })?;
            Ok::<_, IdentityError>(receipt)
        }
        .await;

        match result {
            Ok(receipt) => {
                self.set_state(&did, IdentityState::Registered);
                record_counter(IDENTITY_CREATED, 1);
                info!(did = %did, block = receipt.block_number, "identity created");
                Ok(Identity::from_document(alias, &document))
            }
            Err(e) => {
                self.set_state(&did, IdentityState::Uninitialized);
                warn!(did = %did, error = %e, "identity creation failed");
                Err(e)
            }
        }
    }

    async fn unlock_entry(&self, entry: &StoredIdentity, password: &SecretString) -> IdentityResult<UnlockedIdentity> {
        let key = self
            .crypto
            .derive_envelope_key(password, &entry.envelope)
            .await?;
        let plaintext = self.crypto.decrypt(&entry.envelope, &key).map_err(map_unlock_error)?;
        let secrets = IdentitySecrets::from_bytes(&plaintext)?;

        let signing = KeyPair::from_private(secrets.signing);
        let agreement = KeyPair::from_private(secrets.agreement);
        if entry.document.controller_key() != Some(signing.public_key())
            || entry.document.agreement_key() != Some(agreement.public_key())
        {
            return Err(IdentityError::KeyMismatch(entry.identifier.to_string()));
        }

        Ok(UnlockedIdentity {
            identity: Identity::from_document(&entry.alias, &entry.document),
            document: entry.document.clone(),
            signing,
            agreement,
            session_key: key,
        })
    }

    /// Decrypt the local envelope. Never returns partially decrypted material.
    #[instrument(skip_all, fields(did = %identifier))]
    pub async fn load(&self, identifier: &Did, password: &SecretString) -> IdentityResult<UnlockedIdentity> {
        let _guard = self.locks.lock(identifier).await;
        let entry = self.keystore.load(identifier).map_err(map_keystore_error)?;

        match self.unlock_entry(&entry, password).await {
            Ok(unlocked) => {
                self.set_state(identifier, IdentityState::Loaded);
                record_counter(IDENTITY_UNLOCK_SUCCESS, 1);
                info!("identity loaded");
                Ok(unlocked)
            }
            Err(e) => {
                record_counter(IDENTITY_UNLOCK_FAILED, 1);
                warn!("identity unlock failed");
                Err(e)
            }
        }
    }

    pub fn lock(&self, identifier: &Did) {
        if self.state(identifier) == IdentityState::Loaded {
            self.set_state(identifier, IdentityState::Locked);
            debug!(did = %identifier, "identity locked");
        }
    }

    /// Resolve anyone's DID document from the ledger
    pub async fn resolve(&self, identifier: &Did) -> IdentityResult<DidDocument> {
        Ok(self.ledger.resolve_did(identifier).await?)
    }

    /// Identities held in the local keystore
    pub fn list_local(&self) -> IdentityResult<Vec<Identity>> {
        Ok(self
            .keystore
            .list()?
            .iter()
            .map(|e| Identity::from_document(&e.alias, &e.document))
            .collect())
    }

    pub fn find_by_alias(&self, alias: &str) -> IdentityResult<Option<Identity>> {
        Ok(self
            .keystore
            .find_by_alias(alias)?
            .map(|e| Identity::from_document(&e.alias, &e.document)))
    }

    /// Check `password` against an unlocked session by re-deriving its key
    /// (constant-time comparison)
    pub async fn reauthenticate(&self, unlocked: &UnlockedIdentity, password: &SecretString) -> IdentityResult<()> {
        let session = unlocked.session_key();
        let candidate = self
            .crypto
            .derive_key_with(password, *session.salt(), *session.params())
            .await?;
        if candidate.key() == session.key() {
            Ok(())
        } else {
            warn!(did = %unlocked.did(), "re-authentication failed");
            Err(IdentityError::AuthenticationFailed)
        }
    }

    /// Replace both key pairs. The new document is authorized by the current
    /// controller key; the local envelope is re-encrypted under a fresh salt.
    #[instrument(skip_all, fields(did = %identifier))]
    pub async fn rotate_keys(&self, identifier: &Did, password: &SecretString) -> IdentityResult<UnlockedIdentity> {
        let _guard = self.locks.lock(identifier).await;
        let entry = self.keystore.load(identifier).map_err(map_keystore_error)?;
        let current = self.unlock_entry(&entry, password).await?;

        let generation = entry.document.generation() + 1;
        let signing = self.crypto.generate_key_pair();
        let agreement = self.crypto.generate_agreement_key_pair();
        let mut document = DidDocument::new(identifier, signing.public_key(), agreement.public_key(), generation)
            .retain_assertion_keys(&entry.document);
        document.service = entry.document.service.clone();

        let (envelope, session_key) = self.seal_secrets(&signing, &agreement, generation, password).await?;
        self.anchor(&document, current.signing_key()).await?;

        self.keystore.save(&StoredIdentity {
            document: document.clone(),
            envelope,
            updated_at: Utc::now().trunc_subsecs(0),
            ..entry.clone()
        })?;
        self.set_state(identifier, IdentityState::Loaded);
        info!(generation, key = %fingerprint(signing.public_key().as_bytes()), "keys rotated");

        Ok(UnlockedIdentity {
            identity: Identity::from_document(&entry.alias, &document),
            document,
            signing,
            agreement,
            session_key,
        })
    }

    /// Remove the local envelope. Ledger state is untouched.
    #[instrument(skip_all, fields(did = %identifier))]
    pub async fn wipe(&self, identifier: &Did) -> IdentityResult<()> {
        let _guard = self.locks.lock(identifier).await;
        self.keystore.delete(identifier).map_err(map_keystore_error)?;
        self.set_state(identifier, IdentityState::Uninitialized);
        info!("local identity wiped");
        Ok(())
    }

    /// Encrypted copy of the keystore entry
    pub async fn export_backup(&self, identifier: &Did) -> IdentityResult<IdentityBackup> {
        let _guard = self.locks.lock(identifier).await;
        let entry = self.keystore.load(identifier).map_err(map_keystore_error)?;
        Ok(IdentityBackup {
            identifier: entry.identifier,
            alias: entry.alias,
            document: entry.document,
            envelope: entry.envelope,
        })
    }

    /// Restore a backup onto this device. The envelope is checked against the
    /// password before anything is written.
    #[instrument(skip_all, fields(did = %backup.identifier))]
    pub async fn import_backup(&self, backup: IdentityBackup, password: &SecretString) -> IdentityResult<Identity> {
        let _guard = self.locks.lock(&backup.identifier).await;
        if self.keystore.contains(&backup.identifier)? {
            return Err(IdentityError::AliasInUse(backup.alias));
        }
        let now = Utc::now().trunc_subsecs(0);
        let entry = StoredIdentity {
            identifier: backup.identifier,
            alias: backup.alias,
            document: backup.document,
            envelope: backup.envelope,
            created_at: now,
            updated_at: now,
        };
        self.unlock_entry(&entry, password).await?;
        self.keystore.save(&entry)?;
        self.set_state(&entry.identifier, IdentityState::Registered);
        Ok(Identity::from_document(&entry.alias, &entry.document))
    }
}
