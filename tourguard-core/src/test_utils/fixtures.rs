//! Factory functions and a wired service stack for tests

use super::faults::FaultyLedger;
use crate::config::{CredentialConfig, LedgerConfig};
use crate::core_content::MemoryContentStore;
use crate::core_credential::CredentialService;
use crate::core_crypto::{CryptoService, KdfParams, SALT_LEN};
use crate::core_identity::{Did, DidDocument, IdentityManager, MemoryKeystore, StoredIdentity, UnlockedIdentity};
use crate::core_ledger::{InMemoryLedger, RetryPolicy};
use crate::core_wallet::SessionWallet;
use chrono::{SubsecRound, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

/// Argon2id with the smallest parameters it accepts
pub fn fast_crypto() -> CryptoService {
    CryptoService::new(KdfParams::new(256, 1, 1))
}

pub fn password(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}

/// Ledger settings with millisecond backoff and timeouts
pub fn test_ledger_config() -> LedgerConfig {
    LedgerConfig {
        retry_backoff: Duration::from_millis(1),
        confirmation_timeout: Duration::from_millis(500),
        ..LedgerConfig::default()
    }
}

pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        poll_interval: Duration::from_millis(5),
        ..RetryPolicy::from_config(&test_ledger_config())
    }
}

/// A keystore entry with real keys and a throwaway envelope
pub fn stored_identity(alias: &str) -> StoredIdentity {
    let crypto = fast_crypto();
    let signing = crypto.generate_key_pair();
    let agreement = crypto.generate_agreement_key_pair();
    let did = Did::from_public_key("tourguard", "testnet", signing.public_key());
    let document = DidDocument::new(&did, signing.public_key(), agreement.public_key(), 1);
    let key = crypto.derive_key(&password("pw"), &[7u8; SALT_LEN]).unwrap();
    let envelope = crypto.encrypt(b"not real secrets", &key).unwrap();
    let now = Utc::now().trunc_subsecs(0);
    StoredIdentity {
        identifier: did,
        alias: alias.to_string(),
        document,
        envelope,
        created_at: now,
        updated_at: now,
    }
}

/// Ledger, content store, identity manager and credential service wired
/// together in memory. All ledger traffic goes through `faults`.
pub struct TestStack {
    pub ledger: Arc<InMemoryLedger>,
    pub faults: Arc<FaultyLedger>,
    pub content: Arc<MemoryContentStore>,
    pub identities: Arc<IdentityManager>,
    pub credentials: Arc<CredentialService>,
}

impl TestStack {
    pub fn new() -> Self {
        Self::with_credential_config(CredentialConfig::default())
    }

    pub fn with_credential_config(config: CredentialConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let faults = Arc::new(FaultyLedger::new(ledger.clone()));
        let content = Arc::new(MemoryContentStore::new());
        let identities = Arc::new(
            IdentityManager::new(
                fast_crypto(),
                faults.clone(),
                Arc::new(MemoryKeystore::new()),
                &test_ledger_config(),
            )
            .with_retry_policy(fast_retry_policy()),
        );
        let credentials = Arc::new(CredentialService::new(identities.clone(), content.clone(), &config));
        Self {
            ledger,
            faults,
            content,
            identities,
            credentials,
        }
    }

    /// A wallet sharing this stack's services
    pub fn wallet(&self) -> SessionWallet {
        SessionWallet::new(self.identities.clone(), self.credentials.clone())
    }

    /// Create and load an identity
    pub async fn unlocked(&self, alias: &str, pw: &str) -> UnlockedIdentity {
        let identity = self.identities.create(alias, &password(pw)).await.unwrap();
        self.identities.load(&identity.identifier, &password(pw)).await.unwrap()
    }
}
