//! CredentialService: issue, verify, present and revoke credentials

use super::credential::{CredentialStatus, VerifiableCredential, CREDENTIALS_CONTEXT, VERIFIABLE_CREDENTIAL};
use super::errors::{CredentialError, CredentialResult};
use super::index::CredentialIndex;
use super::kind::{CredentialClaims, KycClaims, VerificationLevel};
use super::kyc::{KycEnvelopeMeta, KycSubmission};
use super::presentation::{VerifiablePresentation, VERIFIABLE_PRESENTATION};
use super::proof::{create_proof, verify_proof, Proof, ProofOptions, ProofPurpose, PROOF_TYPE};
use super::verification::{VerificationError, VerificationResult};
use crate::config::CredentialConfig;
use crate::core_content::{ContentStore, StorageResult, StoredBlobRef};
use crate::core_crypto::{CryptoError, DerivedKey, EncryptedEnvelope};
use crate::core_identity::{Did, DidDocument, IdentityError, IdentityManager, IdentityState, UnlockedIdentity};
use crate::core_ledger::retry::{confirm, submit_with_status_check};
use crate::core_ledger::{
    LedgerClient, LedgerError, RegisterRevocationRequest, RetryPolicy, RevocationSlot, RevokeRequest, TxReceipt,
};
use crate::metrics::{
    record_counter, CONTENT_GET, CONTENT_PUT, CREDENTIAL_ISSUED, CREDENTIAL_REVOKED, CREDENTIAL_VERIFIED_INVALID,
    CREDENTIAL_VERIFIED_VALID,
};
use crate::sync::KeyedLocks;
use chrono::{DateTime, SubsecRound, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

fn map_decrypt_error(err: CryptoError) -> CredentialError {
    match err {
        CryptoError::DecryptionFailed => CredentialError::DecryptionFailed,
        other => CredentialError::Crypto(other),
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Check `proof` over `unsigned` against a key that `document` authorizes for
/// `purpose`
fn check_proof<T: Serialize>(
    unsigned: &T,
    proof: Option<&Proof>,
    signer: &Did,
    document: &DidDocument,
    purpose: ProofPurpose,
    errors: &mut Vec<VerificationError>,
) {
    let Some(proof) = proof else {
        errors.push(VerificationError::MissingProof);
        return;
    };
    let url = &proof.options.verification_method;
    let own_key = url.starts_with(&format!("{}#", signer));
    let key = match purpose {
        ProofPurpose::AssertionMethod => document.assertion_key(url),
        ProofPurpose::Authentication => document.authentication_key(url),
    };
    let Some(key) = key.filter(|_| own_key) else {
        errors.push(VerificationError::UnknownVerificationMethod {
            verification_method: url.clone(),
        });
        return;
    };
    if proof.options.kind != PROOF_TYPE || proof.options.proof_purpose != purpose || !verify_proof(unsigned, proof, key) {
        errors.push(VerificationError::InvalidSignature);
    }
}

pub struct CredentialService {
    identities: Arc<IdentityManager>,
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn LedgerClient>,
    config: CredentialConfig,
    retry: RetryPolicy,
    locks: KeyedLocks<String>,
    index: CredentialIndex,
}

impl CredentialService {
    /// Uses the identity manager's ledger and retry policy
    pub fn new(identities: Arc<IdentityManager>, content: Arc<dyn ContentStore>, config: &CredentialConfig) -> Self {
        Self {
            ledger: identities.ledger().clone(),
            retry: identities.retry_policy().clone(),
            identities,
            content,
            config: config.clone(),
            locks: KeyedLocks::new(),
            index: CredentialIndex::new(),
        }
    }

    pub fn identities(&self) -> &Arc<IdentityManager> {
        &self.identities
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    fn require_loaded(&self, identity: &UnlockedIdentity) -> CredentialResult<()> {
        let state = self.identities.state(identity.did());
        if state != IdentityState::Loaded {
            return Err(IdentityError::InvalidState {
                identifier: identity.did().to_string(),
                state: state.to_string(),
                expected: "Loaded",
            }
            .into());
        }
        Ok(())
    }

    /// Retry `Unavailable` content store calls with the ledger backoff policy
    async fn with_storage_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> StorageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %e, "content store unavailable, backing off");
                    sleep(self.retry.delay_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issue with the configured default validity
    pub async fn issue(
        &self,
        issuer: &UnlockedIdentity,
        subject: &Did,
        claims: CredentialClaims,
    ) -> CredentialResult<VerifiableCredential> {
        let expiration_date = self
            .config
            .default_validity
            .map(|validity| Utc::now().trunc_subsecs(0) + to_chrono(validity));
        self.issue_until(issuer, subject, claims, expiration_date).await
    }

    /// Issue a credential, expiring at `expiration_date` if given.
    ///
    /// The revocation slot is allocated (and confirmed) before signing, so a
    /// returned credential can always be revoked.
    #[instrument(skip_all, fields(issuer = %issuer.did(), subject = %subject, kind = %claims.kind()))]
    pub async fn issue_until(
        &self,
        issuer: &UnlockedIdentity,
        subject: &Did,
        claims: CredentialClaims,
        expiration_date: Option<DateTime<Utc>>,
    ) -> CredentialResult<VerifiableCredential> {
        self.require_loaded(issuer)?;
        let issuance_date = Utc::now().trunc_subsecs(0);
        if expiration_date.is_some_and(|exp| exp <= issuance_date) {
            return Err(CredentialError::InvalidClaims(
                "expiration date must be after the issuance date".to_string(),
            ));
        }

        let id = format!("urn:uuid:{}", Uuid::new_v4());
        let _guard = self.locks.lock(&id).await;

        let slot = self.allocate_revocation_slot(issuer, &id).await?;
        let mut credential = VerifiableCredential::unsigned(
            id,
            issuer.did().clone(),
            subject.clone(),
            &claims,
            issuance_date,
            expiration_date,
            CredentialStatus::new(&slot.list_id, slot.index),
        )?;
        let options = ProofOptions::new(issuer.assertion_method(), ProofPurpose::AssertionMethod);
        credential.proof = Some(create_proof(&credential, options, issuer.signing_key())?);

        self.index.append(credential.clone());
        record_counter(CREDENTIAL_ISSUED, 1);
        info!(credential_id = %credential.id, list_index = slot.index, "credential issued");
        Ok(credential)
    }

    async fn allocate_revocation_slot(&self, issuer: &UnlockedIdentity, credential_id: &str) -> CredentialResult<RevocationSlot> {
        let list_id = self.config.revocation_list_id.clone();
        let request = RegisterRevocationRequest::signed(credential_id, &list_id, issuer.did(), issuer.signing_key())?;
        let ledger = self.ledger.clone();
        let issuer_did = issuer.did().clone();
        let credential_id = credential_id.to_string();

        let slot = submit_with_status_check(
            &self.retry,
            "register_revocation_entry",
            || {
                let ledger = ledger.clone();
                let credential_id = credential_id.clone();
                let issuer_did = issuer_did.clone();
                async move {
                    let record = ledger.revocation_record(&credential_id).await?;
                    Ok::<_, LedgerError>(record.filter(|r| r.issuer == issuer_did).map(|r| RevocationSlot {
                        list_id: r.list_id,
                        index: r.index,
                        receipt: r.allocated_in,
                    }))
                }
            },
            || {
                let ledger = ledger.clone();
                let request = request.clone();
                async move { ledger.register_revocation_entry(request).await }
            },
        )
        .await?;

        let confirmations = confirm(self.ledger.as_ref(), &slot.receipt, &self.retry).await?;
        debug!(tx = %slot.receipt.tx_hash, confirmations, "revocation slot confirmed");
        Ok(slot)
    }

    /// Verify a credential. Never fails: every defect found ends up in
    /// `errors`.
    #[instrument(skip_all, fields(credential_id = %credential.id, issuer = %credential.issuer))]
    pub async fn verify(&self, credential: &VerifiableCredential) -> VerificationResult {
        let mut errors = Vec::new();
        Self::check_structure(credential, &mut errors);

        match self.identities.resolve(&credential.issuer).await {
            Ok(document) => check_proof(
                &credential.without_proof(),
                credential.proof.as_ref(),
                &credential.issuer,
                &document,
                ProofPurpose::AssertionMethod,
                &mut errors,
            ),
            Err(e) => {
                errors.push(VerificationError::IssuerUnresolvable {
                    issuer: credential.issuer.to_string(),
                    reason: e.to_string(),
                });
                if credential.proof.is_none() {
                    errors.push(VerificationError::MissingProof);
                }
            }
        }

        self.check_revocation(credential, &mut errors).await;
        self.check_dates(credential, &mut errors);

        let result = VerificationResult::from_errors(errors);
        if result.valid {
            record_counter(CREDENTIAL_VERIFIED_VALID, 1);
            debug!("credential valid");
        } else {
            record_counter(CREDENTIAL_VERIFIED_INVALID, 1);
            debug!(errors = result.errors.len(), "credential invalid");
        }
        result
    }

    fn check_structure(credential: &VerifiableCredential, errors: &mut Vec<VerificationError>) {
        let mut malformed = |reason: &str| {
            errors.push(VerificationError::Malformed {
                reason: reason.to_string(),
            })
        };
        if credential.context.first().map(String::as_str) != Some(CREDENTIALS_CONTEXT) {
            malformed("missing credentials context");
        }
        if !credential.types.iter().any(|t| t == VERIFIABLE_CREDENTIAL) {
            malformed("type does not include VerifiableCredential");
        }
        if credential.kind().is_none() {
            malformed("unknown credential type");
        }
        let uuid = credential.id.strip_prefix("urn:uuid:").map(Uuid::parse_str);
        if !matches!(uuid, Some(Ok(_))) {
            malformed("id is not a UUID URN");
        }
    }

    /// Fail closed: anything short of a consistent, unrevoked ledger entry is
    /// an error
    async fn check_revocation(&self, credential: &VerifiableCredential, errors: &mut Vec<VerificationError>) {
        let unavailable = |reason: String| VerificationError::RevocationStatusUnavailable { reason };

        let revoked = match self.ledger.is_revoked(&credential.id).await {
            Ok(revoked) => revoked,
            Err(e) => {
                warn!(credential_id = %credential.id, error = %e, "revocation status unavailable");
                errors.push(unavailable(e.to_string()));
                return;
            }
        };
        let record = match self.ledger.revocation_record(&credential.id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                errors.push(unavailable("no revocation entry".to_string()));
                return;
            }
            Err(e) => {
                errors.push(unavailable(e.to_string()));
                return;
            }
        };

        let status = &credential.credential_status;
        if record.issuer != credential.issuer
            || record.list_id != status.revocation_list_id
            || record.index != status.revocation_list_index
        {
            errors.push(unavailable("revocation entry does not match credential status".to_string()));
            return;
        }
        if revoked {
            errors.push(VerificationError::Revoked {
                reason: record.reason,
                revoked_at: record.revoked_at,
            });
        }
    }

    fn check_dates(&self, credential: &VerifiableCredential, errors: &mut Vec<VerificationError>) {
        let now = Utc::now();
        let skew = to_chrono(self.config.clock_skew);

        if credential.issuance_date > now + skew {
            errors.push(VerificationError::IssuedInFuture {
                issuance_date: credential.issuance_date,
            });
        }
        if let Some(expiration_date) = credential.expiration_date {
            if expiration_date < credential.issuance_date {
                errors.push(VerificationError::Malformed {
                    reason: "expiration date precedes issuance date".to_string(),
                });
            } else if expiration_date + skew < now {
                errors.push(VerificationError::Expired { expiration_date });
            }
        }
    }

    /// Sign a presentation of `credentials` with the holder's authentication
    /// key
    #[instrument(skip_all, fields(holder = %holder.did(), credentials = credentials.len()))]
    pub async fn create_presentation(
        &self,
        holder: &UnlockedIdentity,
        credentials: Vec<VerifiableCredential>,
        challenge: Option<String>,
    ) -> CredentialResult<VerifiablePresentation> {
        self.require_loaded(holder)?;
        let mut presentation =
            VerifiablePresentation::unsigned(format!("urn:uuid:{}", Uuid::new_v4()), holder.did().clone(), credentials);
        let options = ProofOptions::new(holder.authentication_method(), ProofPurpose::Authentication).with_challenge(challenge);
        presentation.proof = Some(create_proof(&presentation, options, holder.signing_key())?);
        Ok(presentation)
    }

    /// Verify the holder's proof and every embedded credential. Any invalid
    /// credential invalidates the whole presentation.
    #[instrument(skip_all, fields(presentation_id = %presentation.id, holder = %presentation.holder))]
    pub async fn verify_presentation(
        &self,
        presentation: &VerifiablePresentation,
        expected_challenge: Option<&str>,
    ) -> VerificationResult {
        let mut errors = Vec::new();
        if !presentation.types.iter().any(|t| t == VERIFIABLE_PRESENTATION) {
            errors.push(VerificationError::Malformed {
                reason: "type does not include VerifiablePresentation".to_string(),
            });
        }

        match self.identities.resolve(&presentation.holder).await {
            Ok(document) => check_proof(
                &presentation.without_proof(),
                presentation.proof.as_ref(),
                &presentation.holder,
                &document,
                ProofPurpose::Authentication,
                &mut errors,
            ),
            Err(e) => errors.push(VerificationError::HolderUnresolvable {
                holder: presentation.holder.to_string(),
                reason: e.to_string(),
            }),
        }

        if let Some(expected) = expected_challenge {
            if presentation.challenge() != Some(expected) {
                errors.push(VerificationError::ChallengeMismatch);
            }
        }

        for credential in &presentation.verifiable_credential {
            if credential.subject() != &presentation.holder {
                errors.push(VerificationError::SubjectNotHolder {
                    credential_id: credential.id.clone(),
                });
            }
            let result = self.verify(credential).await;
            if !result.valid {
                errors.push(VerificationError::CredentialInvalid {
                    credential_id: credential.id.clone(),
                    errors: result.errors,
                });
            }
        }

        VerificationResult::from_errors(errors)
    }

    /// Revoke a credential. Only its issuer may do so.
    #[instrument(skip_all, fields(issuer = %issuer.did(), credential_id = %credential_id))]
    pub async fn revoke(&self, issuer: &UnlockedIdentity, credential_id: &str, reason: &str) -> CredentialResult<TxReceipt> {
        self.require_loaded(issuer)?;
        let _guard = self.locks.lock(&credential_id.to_string()).await;

        if let Some(local) = self.index.get(credential_id) {
            if local.issuer != *issuer.did() {
                return Err(CredentialError::Unauthorized(format!(
                    "{} is not the issuer of {}",
                    issuer.did(),
                    credential_id
                )));
            }
        }
        let record = self
            .ledger
            .revocation_record(credential_id)
            .await?
            .ok_or_else(|| CredentialError::NotFound(credential_id.to_string()))?;
        if record.issuer != *issuer.did() {
            return Err(CredentialError::Unauthorized(format!(
                "{} is not the issuer of {}",
                issuer.did(),
                credential_id
            )));
        }
        if record.revoked {
            return Err(LedgerError::AlreadyRevoked(credential_id.to_string()).into());
        }

        let request = RevokeRequest::signed(credential_id, reason, issuer.signing_key())?;
        let ledger = self.ledger.clone();
        let id = credential_id.to_string();
        let receipt = submit_with_status_check(
            &self.retry,
            "revoke",
            || {
                let ledger = ledger.clone();
                let id = id.clone();
                async move {
                    let record = ledger.revocation_record(&id).await?;
                    Ok::<_, LedgerError>(record.filter(|r| r.revoked).and_then(|r| r.revoked_in))
                }
            },
            || {
                let ledger = ledger.clone();
                let request = request.clone();
                async move { ledger.revoke(request).await }
            },
        )
        .await?;
        confirm(self.ledger.as_ref(), &receipt, &self.retry).await?;

        record_counter(CREDENTIAL_REVOKED, 1);
        info!(block = receipt.block_number, "credential revoked");
        Ok(receipt)
    }

    /// Encrypt under a fresh password-derived key and upload the ciphertext
    #[instrument(skip_all)]
    pub async fn store_encrypted_payload(&self, data: &[u8], password: &SecretString) -> CredentialResult<KycEnvelopeMeta> {
        let envelope = self.identities.crypto().encrypt_with_password(data, password).await?;
        self.upload_envelope(&envelope).await
    }

    /// Encrypt under an already derived key (e.g. a session key)
    #[instrument(skip_all)]
    pub async fn store_encrypted_payload_with_key(&self, data: &[u8], key: &DerivedKey) -> CredentialResult<KycEnvelopeMeta> {
        let envelope = self.identities.crypto().encrypt(data, key)?;
        self.upload_envelope(&envelope).await
    }

    async fn upload_envelope(&self, envelope: &EncryptedEnvelope) -> CredentialResult<KycEnvelopeMeta> {
        let content_id = self
            .with_storage_retry("put", || self.content.put(&envelope.ciphertext))
            .await?;
        record_counter(CONTENT_PUT, 1);

        if let Err(e) = self.with_storage_retry("pin", || self.content.pin(&content_id)).await {
            error!(content_id = %content_id, error = %e, "pinning encrypted payload failed");
            return Err(e.into());
        }
        info!(content_id = %content_id, "encrypted payload stored");
        Ok(KycEnvelopeMeta::describe(content_id, envelope, Utc::now().trunc_subsecs(0)))
    }

    async fn download_envelope(&self, meta: &KycEnvelopeMeta) -> CredentialResult<EncryptedEnvelope> {
        let ciphertext = self
            .with_storage_retry("get", || self.content.get(&meta.content_id))
            .await?;
        record_counter(CONTENT_GET, 1);
        Ok(meta.envelope(ciphertext))
    }

    /// Fetch and decrypt with the password the payload was stored under
    #[instrument(skip_all, fields(content_id = %meta.content_id))]
    pub async fn load_encrypted_payload(
        &self,
        meta: &KycEnvelopeMeta,
        password: &SecretString,
    ) -> CredentialResult<Zeroizing<Vec<u8>>> {
        let envelope = self.download_envelope(meta).await?;
        self.identities
            .crypto()
            .decrypt_with_password(&envelope, password)
            .await
            .map_err(map_decrypt_error)
    }

    #[instrument(skip_all, fields(content_id = %meta.content_id))]
    pub async fn load_encrypted_payload_with_key(
        &self,
        meta: &KycEnvelopeMeta,
        key: &DerivedKey,
    ) -> CredentialResult<Zeroizing<Vec<u8>>> {
        let envelope = self.download_envelope(meta).await?;
        self.identities.crypto().decrypt(&envelope, key).map_err(map_decrypt_error)
    }

    /// Store `payload` under the holder's session key and self-issue a KYC
    /// credential pointing at it
    #[instrument(skip_all, fields(holder = %holder.did()))]
    pub async fn submit_kyc(
        &self,
        holder: &UnlockedIdentity,
        payload: &[u8],
        nationality: &str,
        verification_level: VerificationLevel,
    ) -> CredentialResult<KycSubmission> {
        self.require_loaded(holder)?;
        let meta = self.store_encrypted_payload_with_key(payload, holder.session_key()).await?;
        let claims = CredentialClaims::Kyc(KycClaims {
            nationality: nationality.to_string(),
            verification_level,
            kyc_data: Some(meta.clone()),
        });
        let credential = self.issue(holder, holder.did(), claims).await?;
        Ok(KycSubmission { meta, credential })
    }

    /// Store the credential document (pinned) on the content store
    #[instrument(skip_all, fields(credential_id = %credential.id))]
    pub async fn publish(&self, credential: &VerifiableCredential) -> CredentialResult<StoredBlobRef> {
        let bytes = serde_json::to_vec(credential)?;
        let content_id = self.with_storage_retry("put", || self.content.put(&bytes)).await?;
        record_counter(CONTENT_PUT, 1);
        self.with_storage_retry("pin", || self.content.pin(&content_id)).await?;
        debug!(content_id = %content_id, "credential published");
        Ok(content_id.into())
    }

    pub async fn fetch(&self, blob: &StoredBlobRef) -> CredentialResult<VerifiableCredential> {
        let bytes = self
            .with_storage_retry("get", || self.content.get(&blob.content_id))
            .await?;
        record_counter(CONTENT_GET, 1);
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Record a credential received from elsewhere in the subject's local list
    pub fn accept(&self, credential: VerifiableCredential) -> bool {
        self.index.append(credential)
    }

    pub fn credentials_for(&self, subject: &Did) -> Vec<VerifiableCredential> {
        self.index.for_subject(subject)
    }

    pub fn find(&self, credential_id: &str) -> Option<VerifiableCredential> {
        self.index.get(credential_id)
    }

    /// Drop the local credential list of `subject`
    pub fn forget(&self, subject: &Did) {
        self.index.forget(subject);
    }
}
