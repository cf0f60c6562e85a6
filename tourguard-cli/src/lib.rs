//! Command implementations for the `tourguard` binary
//!
//! Wires the core services over a data directory:
//!
//! ```text
//! <data-dir>/keystore/     encrypted identities
//! <data-dir>/content/      content-addressed blobs
//! <data-dir>/ledger.json   in-process ledger snapshot (demo only)
//! ```
//!
//! Every command runs through a [`SessionWallet`]; the ledger snapshot is
//! written back after each mutating command.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tourguard_core::config::{ContentConfig, KeystoreConfig, StorageBackend};
use tourguard_core::core_credential::{CredentialClaims, KycClaims};
use tourguard_core::core_ledger::TxReceipt;
use tourguard_core::{
    Config, ContentStore, CredentialService, CryptoService, Did, FileContentStore, FileKeystore, Identity,
    IdentityManager, InMemoryLedger, Keystore, KycEnvelopeMeta, MemoryContentStore, MemoryKeystore, SessionError,
    SessionWallet, VerifiableCredential, VerificationLevel, VerificationResult,
};
use tracing::{debug, info};
use zeroize::Zeroizing;

pub const LEDGER_FILE: &str = "ledger.json";

fn content_store(config: &ContentConfig) -> Result<Arc<dyn ContentStore>> {
    Ok(match config.backend {
        StorageBackend::Memory => Arc::new(MemoryContentStore::new()),
        StorageBackend::File => Arc::new(
            FileContentStore::new(&config.data_dir)
                .with_context(|| format!("opening content store at {}", config.data_dir.display()))?,
        ),
    })
}

fn keystore(config: &KeystoreConfig) -> Result<Arc<dyn Keystore>> {
    Ok(match config.backend {
        StorageBackend::Memory => Arc::new(MemoryKeystore::new()),
        StorageBackend::File => Arc::new(
            FileKeystore::new(&config.path)
                .with_context(|| format!("opening keystore at {}", config.path.display()))?,
        ),
    })
}

/// Point both stores at file backends under `data_dir`
pub fn rooted_at(mut config: Config, data_dir: &Path) -> Config {
    config.content = ContentConfig {
        backend: StorageBackend::File,
        data_dir: data_dir.join("content"),
    };
    config.keystore = KeystoreConfig {
        backend: StorageBackend::File,
        path: data_dir.join("keystore"),
    };
    config
}

/// Surface session errors with their user-facing text
fn session(err: SessionError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

pub struct App {
    ledger: Arc<InMemoryLedger>,
    identities: Arc<IdentityManager>,
    ledger_path: PathBuf,
    wallet: SessionWallet,
}

impl App {
    /// Open (or initialize) the state under `data_dir`
    pub fn open(config: &Config, data_dir: &Path) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(data_dir).with_context(|| format!("creating {}", data_dir.display()))?;

        let ledger_path = data_dir.join(LEDGER_FILE);
        let ledger = Arc::new(
            InMemoryLedger::load_from_file(&ledger_path)
                .with_context(|| format!("loading ledger snapshot {}", ledger_path.display()))?,
        );

        let identities = Arc::new(IdentityManager::new(
            CryptoService::from_config(&config.crypto),
            ledger.clone(),
            keystore(&config.keystore)?,
            &config.ledger,
        ));
        let credentials = Arc::new(CredentialService::new(
            identities.clone(),
            content_store(&config.content)?,
            &config.credential,
        ));
        debug!(data_dir = %data_dir.display(), "application state opened");

        Ok(Self {
            ledger,
            ledger_path,
            wallet: SessionWallet::new(identities.clone(), credentials),
            identities,
        })
    }

    pub fn wallet(&self) -> &SessionWallet {
        &self.wallet
    }

    fn persist(&self) -> Result<()> {
        self.ledger
            .save_to_file(&self.ledger_path)
            .with_context(|| format!("writing ledger snapshot {}", self.ledger_path.display()))
    }

    async fn unlock(&self, alias: &str, password: &SecretString) -> Result<Identity> {
        self.wallet.unlock_alias(alias, password).await.map_err(session)
    }

    /// `create`: new identity registered on the ledger
    pub async fn create(&self, alias: &str, password: &SecretString) -> Result<Identity> {
        let identity = self
            .identities
            .create(alias, password)
            .await
            .with_context(|| format!("creating identity {:?}", alias))?;
        self.persist()?;
        info!(did = %identity.identifier, "identity created");
        Ok(identity)
    }

    /// `issue-kyc`: issue a KYC credential from `alias` to `subject` (itself
    /// by default)
    pub async fn issue_kyc(
        &self,
        alias: &str,
        password: &SecretString,
        subject: Option<&str>,
        nationality: &str,
        level: &str,
    ) -> Result<VerifiableCredential> {
        let verification_level: VerificationLevel = level.parse().map_err(anyhow::Error::msg)?;
        let issuer = self.unlock(alias, password).await?;
        let subject = match subject {
            Some(s) => s.parse::<Did>()?,
            None => issuer.identifier.clone(),
        };
        let claims = CredentialClaims::Kyc(KycClaims {
            nationality: nationality.to_string(),
            verification_level,
            kyc_data: None,
        });

        let credential = self.wallet.issue(&subject, claims).await.map_err(session)?;
        self.wallet.lock().await;
        self.persist()?;
        Ok(credential)
    }

    /// `verify`: check a credential document
    pub async fn verify(&self, credential_json: &str) -> Result<VerificationResult> {
        let credential = VerifiableCredential::from_json(credential_json).context("parsing credential")?;
        Ok(self.wallet.verify(&credential).await)
    }

    /// `revoke`: revoke a credential issued by `alias`
    pub async fn revoke(
        &self,
        alias: &str,
        password: &SecretString,
        credential_id: &str,
        reason: &str,
    ) -> Result<TxReceipt> {
        self.unlock(alias, password).await?;
        let receipt = self.wallet.revoke(credential_id, reason, password).await;
        self.wallet.lock().await;
        let receipt = receipt.map_err(session)?;
        self.persist()?;
        Ok(receipt)
    }

    /// `store-kyc`: encrypt `data` under `payload_password` and store it
    pub async fn store_kyc(
        &self,
        alias: &str,
        password: &SecretString,
        payload_password: &SecretString,
        data: &[u8],
    ) -> Result<KycEnvelopeMeta> {
        self.unlock(alias, password).await?;
        let meta = self.wallet.store_kyc_payload(data, payload_password).await;
        self.wallet.lock().await;
        meta.map_err(session)
    }

    /// `load-kyc`: fetch and decrypt a payload stored by `store-kyc`
    pub async fn load_kyc(
        &self,
        alias: &str,
        password: &SecretString,
        payload_password: &SecretString,
        meta_json: &str,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let meta: KycEnvelopeMeta = serde_json::from_str(meta_json).context("parsing envelope metadata")?;
        self.unlock(alias, password).await?;
        let plaintext = self.wallet.load_kyc_payload(&meta, payload_password).await;
        self.wallet.lock().await;
        plaintext.map_err(session)
    }
}
