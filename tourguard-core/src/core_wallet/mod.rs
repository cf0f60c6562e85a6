//! SessionWallet: the single unlocked identity of this process
//!
//! Holds the unlocked keys, the session key derived from the password and
//! the credentials accumulated during the session. The password itself is
//! never kept; sensitive operations (revoke, export) ask for it again and
//! compare the re-derived key with the session key.

pub mod errors;

#[cfg(test)]
mod tests;

pub use errors::{SessionError, SessionResult};

use crate::core_credential::{
    CredentialError, CredentialService, KycEnvelopeMeta, KycSubmission, VerifiableCredential, VerifiablePresentation,
    VerificationLevel, VerificationResult,
};
use crate::core_credential::CredentialClaims;
use crate::core_crypto::{CryptoError, SealedBox, Signature};
use crate::core_identity::{Did, Identity, IdentityBackup, IdentityError, IdentityManager, UnlockedIdentity};
use crate::core_ledger::TxReceipt;
use errors::from_unlock;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

struct SessionIdentity {
    unlocked: UnlockedIdentity,
    credentials: Vec<VerifiableCredential>,
}

pub struct SessionWallet {
    identities: Arc<IdentityManager>,
    credentials: Arc<CredentialService>,
    session: RwLock<Option<SessionIdentity>>,
    // serializes unlock / lock / rotate
    transition: Mutex<()>,
}

impl SessionWallet {
    pub fn new(identities: Arc<IdentityManager>, credentials: Arc<CredentialService>) -> Self {
        Self {
            identities,
            credentials,
            session: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn credential_service(&self) -> &Arc<CredentialService> {
        &self.credentials
    }

    /// Unlock `identifier`, replacing any current session
    #[instrument(skip_all, fields(did = %identifier))]
    pub async fn unlock(&self, identifier: &Did, password: &SecretString) -> SessionResult<Identity> {
        let _transition = self.transition.lock().await;
        let unlocked = self.identities.load(identifier, password).await.map_err(from_unlock)?;
        let identity = unlocked.identity().clone();
        let credentials = self.credentials.credentials_for(identifier);

        let mut session = self.session.write().await;
        if let Some(previous) = session.take() {
            self.identities.lock(previous.unlocked.did());
        }
        *session = Some(SessionIdentity { unlocked, credentials });
        info!("session unlocked");
        Ok(identity)
    }

    pub async fn unlock_alias(&self, alias: &str, password: &SecretString) -> SessionResult<Identity> {
        let identity = self
            .identities
            .find_by_alias(alias)?
            .ok_or_else(|| IdentityError::NotFound(alias.to_string()))?;
        self.unlock(&identity.identifier, password).await
    }

    /// End the session; key material is zeroized as it drops
    pub async fn lock(&self) {
        let _transition = self.transition.lock().await;
        if let Some(previous) = self.session.write().await.take() {
            self.identities.lock(previous.unlocked.did());
            info!(did = %previous.unlocked.did(), "session locked");
        }
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.session.read().await.as_ref().map(|s| s.unlocked.identity().clone())
    }

    pub async fn is_unlocked(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Credentials held by the session identity
    pub async fn credentials(&self) -> SessionResult<Vec<VerifiableCredential>> {
        let session = self.session.read().await;
        Ok(session.as_ref().ok_or(SessionError::NoActiveSession)?.credentials.clone())
    }

    async fn remember(&self, credential: &VerifiableCredential) {
        if let Some(session) = self.session.write().await.as_mut() {
            if credential.subject() == session.unlocked.did() && !session.credentials.iter().any(|c| c.id == credential.id)
            {
                session.credentials.push(credential.clone());
            }
        }
    }

    /// Issue a credential signed by the session identity
    pub async fn issue(&self, subject: &Did, claims: CredentialClaims) -> SessionResult<VerifiableCredential> {
        let credential = {
            let session = self.session.read().await;
            let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
            self.credentials.issue(&session.unlocked, subject, claims).await?
        };
        self.remember(&credential).await;
        Ok(credential)
    }

    /// Keep a credential issued to the session identity by someone else
    pub async fn accept_credential(&self, credential: VerifiableCredential) -> SessionResult<()> {
        let own = self.require_did().await?;
        if credential.subject() != &own {
            return Err(CredentialError::Unauthorized(format!(
                "{} was issued to {}, not {}",
                credential.id,
                credential.subject(),
                own
            ))
            .into());
        }
        self.credentials.accept(credential.clone());
        self.remember(&credential).await;
        Ok(())
    }

    async fn require_did(&self) -> SessionResult<Did> {
        let session = self.session.read().await;
        Ok(session.as_ref().ok_or(SessionError::NoActiveSession)?.unlocked.did().clone())
    }

    pub async fn sign(&self, message: &[u8]) -> SessionResult<Signature> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(self.identities.crypto().sign(message, session.unlocked.signing_key())?)
    }

    /// Encrypt KYC data under the session key and self-issue a KYC credential
    pub async fn submit_kyc(
        &self,
        payload: &[u8],
        nationality: &str,
        verification_level: VerificationLevel,
    ) -> SessionResult<KycSubmission> {
        let submission = {
            let session = self.session.read().await;
            let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
            self.credentials
                .submit_kyc(&session.unlocked, payload, nationality, verification_level)
                .await?
        };
        self.remember(&submission.credential).await;
        Ok(submission)
    }

    /// Decrypt a payload stored with [`SessionWallet::submit_kyc`]
    pub async fn decrypt_own_kyc(&self, meta: &KycEnvelopeMeta) -> SessionResult<Zeroizing<Vec<u8>>> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(self
            .credentials
            .load_encrypted_payload_with_key(meta, session.unlocked.session_key())
            .await?)
    }

    /// Store a payload under its own password
    pub async fn store_kyc_payload(&self, payload: &[u8], password: &SecretString) -> SessionResult<KycEnvelopeMeta> {
        self.require_did().await?;
        Ok(self.credentials.store_encrypted_payload(payload, password).await?)
    }

    pub async fn load_kyc_payload(
        &self,
        meta: &KycEnvelopeMeta,
        password: &SecretString,
    ) -> SessionResult<Zeroizing<Vec<u8>>> {
        self.require_did().await?;
        Ok(self.credentials.load_encrypted_payload(meta, password).await?)
    }

    /// Present session credentials (all of them when `credential_ids` is
    /// empty)
    pub async fn present(&self, credential_ids: &[String], challenge: Option<String>) -> SessionResult<VerifiablePresentation> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        let mut selected = Vec::new();
        for id in credential_ids {
            let credential = session
                .credentials
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| CredentialError::NotFound(id.clone()))?;
            selected.push(credential.clone());
        }
        if credential_ids.is_empty() {
            selected = session.credentials.clone();
        }
        Ok(self
            .credentials
            .create_presentation(&session.unlocked, selected, challenge)
            .await?)
    }

    /// Verify anyone's credential; no session needed
    pub async fn verify(&self, credential: &VerifiableCredential) -> VerificationResult {
        self.credentials.verify(credential).await
    }

    pub async fn verify_presentation(
        &self,
        presentation: &VerifiablePresentation,
        expected_challenge: Option<&str>,
    ) -> VerificationResult {
        self.credentials.verify_presentation(presentation, expected_challenge).await
    }

    async fn reauthenticate(&self, unlocked: &UnlockedIdentity, password: &SecretString) -> SessionResult<()> {
        self.identities.reauthenticate(unlocked, password).await.map_err(|e| {
            warn!(did = %unlocked.did(), "re-authentication rejected");
            from_unlock(e)
        })
    }

    /// Revoke a credential issued by the session identity. Requires the
    /// password again.
    #[instrument(skip_all, fields(credential_id = %credential_id))]
    pub async fn revoke(&self, credential_id: &str, reason: &str, password: &SecretString) -> SessionResult<TxReceipt> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        self.reauthenticate(&session.unlocked, password).await?;
        Ok(self.credentials.revoke(&session.unlocked, credential_id, reason).await?)
    }

    /// Encrypted backup of the session identity. Requires the password again.
    pub async fn export_backup(&self, password: &SecretString) -> SessionResult<IdentityBackup> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        self.reauthenticate(&session.unlocked, password).await?;
        let backup = self.identities.export_backup(session.unlocked.did()).await?;
        debug!(did = %backup.identifier, "backup exported");
        Ok(backup)
    }

    /// Remove the session identity from this device and end the session.
    /// Requires the password again; ledger state is untouched.
    #[instrument(skip_all)]
    pub async fn wipe(&self, password: &SecretString) -> SessionResult<()> {
        let _transition = self.transition.lock().await;
        let mut session = self.session.write().await;
        let current = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        self.reauthenticate(&current.unlocked, password).await?;

        let did = current.unlocked.did().clone();
        self.identities.wipe(&did).await?;
        self.credentials.forget(&did);
        *session = None;
        info!(did = %did, "identity wiped from device");
        Ok(())
    }

    /// Seal bytes to `recipient`'s key-agreement key
    pub async fn seal_for(&self, recipient: &Did, plaintext: &[u8]) -> SessionResult<SealedBox> {
        self.require_did().await?;
        let document = self.identities.resolve(recipient).await?;
        let key = document
            .agreement_key()
            .ok_or_else(|| CryptoError::InvalidKey(format!("{} has no key-agreement key", recipient)))?;
        Ok(self.identities.crypto().seal(plaintext, key)?)
    }

    pub async fn open_sealed(&self, sealed: &SealedBox) -> SessionResult<Zeroizing<Vec<u8>>> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(self.identities.crypto().open(sealed, session.unlocked.agreement_key())?)
    }

    /// Rotate the session identity's keys; the session continues with the
    /// new keys
    #[instrument(skip_all)]
    pub async fn rotate_keys(&self, password: &SecretString) -> SessionResult<Identity> {
        let _transition = self.transition.lock().await;
        let mut session = self.session.write().await;
        let current = session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let did = current.unlocked.did().clone();

        let rotated = self.identities.rotate_keys(&did, password).await.map_err(from_unlock)?;
        let identity = rotated.identity().clone();
        current.unlocked = rotated;
        info!(did = %did, "session keys rotated");
        Ok(identity)
    }
}
