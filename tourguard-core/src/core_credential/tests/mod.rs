//! Issue / verify / revoke scenarios against the in-memory stack

use super::*;
use crate::config::CredentialConfig;
use crate::core_content::{ContentStore, StorageError};
use crate::core_crypto::CryptoError;
use crate::core_identity::IdentityError;
use crate::core_ledger::{LedgerClient, LedgerError};
use crate::test_utils::{password, FaultMode, TestStack};
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

fn kyc_basic() -> CredentialClaims {
    CredentialClaims::Kyc(KycClaims {
        nationality: "IN".to_string(),
        verification_level: VerificationLevel::Basic,
        kyc_data: None,
    })
}

fn membership() -> CredentialClaims {
    CredentialClaims::GroupMembership(GroupMembershipClaims {
        group_id: "grp-42".to_string(),
        group_name: "Hampi heritage walk".to_string(),
        role: GroupRole::Member,
    })
}

fn has(result: &VerificationResult, pred: impl Fn(&VerificationError) -> bool) -> bool {
    result.errors.iter().any(pred)
}

#[tokio::test]
async fn test_kyc_issue_verify_revoke() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;

    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();
    let result = stack.credentials.verify(&vc).await;
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(vc.claim("verificationLevel").unwrap(), "basic");
    assert_eq!(vc.kind(), Some(CredentialKind::Kyc));

    stack.credentials.revoke(&alice, &vc.id, "document expired").await.unwrap();
    let result = stack.credentials.verify(&vc).await;
    assert!(!result.valid);
    assert!(result.is_revoked());
    assert!(has(&result, |e| matches!(
        e,
        VerificationError::Revoked { reason: Some(r), revoked_at: Some(_) } if r == "document expired"
    )));
}

#[tokio::test]
async fn test_tampered_signature_fails_regardless_of_revocation() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let mut tampered = vc.clone();
    tampered.proof.as_mut().unwrap().signature_value.0[0] ^= 0x01;
    let result = stack.credentials.verify(&tampered).await;
    assert!(!result.valid);
    assert_eq!(result.errors, vec![VerificationError::InvalidSignature]);

    // all defects are collected, not just the first
    stack.credentials.revoke(&alice, &vc.id, "test").await.unwrap();
    let result = stack.credentials.verify(&tampered).await;
    assert!(has(&result, |e| *e == VerificationError::InvalidSignature));
    assert!(result.is_revoked());
}

#[tokio::test]
async fn test_modified_claims_fail() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let mut vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    vc.credential_subject
        .claims
        .insert("verificationLevel".to_string(), "full".into());
    let result = stack.credentials.verify(&vc).await;
    assert_eq!(result.errors, vec![VerificationError::InvalidSignature]);
}

#[tokio::test]
async fn test_missing_proof() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let result = stack.credentials.verify(&vc.without_proof()).await;
    assert_eq!(result.errors, vec![VerificationError::MissingProof]);
}

#[tokio::test]
async fn test_issued_to_another_subject() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let bob = stack.unlocked("bob", "p2").await;

    let vc = stack.credentials.issue(&alice, bob.did(), membership()).await.unwrap();
    assert_eq!(vc.subject(), bob.did());
    assert_eq!(&vc.issuer, alice.did());
    assert!(stack.credentials.verify(&vc).await.valid);

    let held = stack.credentials.credentials_for(bob.did());
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].id, vc.id);
    assert!(stack.credentials.credentials_for(alice.did()).is_empty());
}

#[tokio::test]
async fn test_only_issuer_may_revoke() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let bob = stack.unlocked("bob", "p2").await;
    let vc = stack.credentials.issue(&alice, bob.did(), membership()).await.unwrap();

    let err = stack.credentials.revoke(&bob, &vc.id, "mine now").await.unwrap_err();
    assert!(matches!(err, CredentialError::Unauthorized(_)));
    assert!(stack.credentials.verify(&vc).await.valid);
}

#[tokio::test]
async fn test_revoke_twice_and_unknown() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    stack.credentials.revoke(&alice, &vc.id, "first").await.unwrap();
    let err = stack.credentials.revoke(&alice, &vc.id, "second").await.unwrap_err();
    assert!(matches!(err, CredentialError::Ledger(LedgerError::AlreadyRevoked(_))));

    let err = stack.credentials.revoke(&alice, "urn:uuid:unknown", "x").await.unwrap_err();
    assert!(matches!(err, CredentialError::NotFound(_)));
}

#[tokio::test]
async fn test_locked_issuer_cannot_issue() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    stack.identities.lock(alice.did());

    let err = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap_err();
    assert!(matches!(err, CredentialError::Identity(IdentityError::InvalidState { .. })));
}

#[tokio::test]
async fn test_unregistered_issuer_is_unresolvable() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let mut vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let other = TestStack::new();
    let stranger = other.unlocked("mallory", "p9").await;
    vc.issuer = stranger.did().clone();

    let result = stack.credentials.verify(&vc).await;
    assert!(has(&result, |e| matches!(e, VerificationError::IssuerUnresolvable { .. })));
    // the ledger entry belongs to alice, so the status cannot vouch for it
    assert!(has(&result, |e| matches!(e, VerificationError::RevocationStatusUnavailable { .. })));
}

#[tokio::test]
async fn test_revocation_status_failure_fails_closed() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    stack.faults.fail_next_reads(1);
    let result = stack.credentials.verify(&vc).await;
    assert!(!result.valid);
    assert!(has(&result, |e| matches!(e, VerificationError::RevocationStatusUnavailable { .. })));

    assert!(stack.credentials.verify(&vc).await.valid);
}

#[tokio::test]
async fn test_future_issuance_and_expiry() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let mut future = vc.clone();
    future.issuance_date = Utc::now() + ChronoDuration::hours(1);
    let result = stack.credentials.verify(&future).await;
    assert!(has(&result, |e| matches!(e, VerificationError::IssuedInFuture { .. })));

    let mut expired = vc.clone();
    expired.issuance_date = vc.issuance_date - ChronoDuration::days(30);
    expired.expiration_date = Some(vc.issuance_date - ChronoDuration::days(20));
    let result = stack.credentials.verify(&expired).await;
    assert!(has(&result, |e| matches!(e, VerificationError::Expired { .. })));
}

#[tokio::test]
async fn test_default_validity_sets_expiration() {
    let stack = TestStack::with_credential_config(CredentialConfig {
        default_validity: Some(Duration::from_secs(3600)),
        ..CredentialConfig::default()
    });
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let validity = vc.expiration_date.unwrap() - vc.issuance_date;
    assert!(validity <= ChronoDuration::seconds(3600) && validity >= ChronoDuration::seconds(3599));
    assert!(stack.credentials.verify(&vc).await.valid);

    let err = stack
        .credentials
        .issue_until(&alice, alice.did(), kyc_basic(), Some(Utc::now() - ChronoDuration::minutes(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::InvalidClaims(_)));
}

#[tokio::test]
async fn test_concurrent_issues_get_distinct_slots() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;

    let issues = (0..6).map(|_| stack.credentials.issue(&alice, alice.did(), membership()));
    let credentials: Vec<_> = futures::future::join_all(issues)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let mut indexes: Vec<_> = credentials
        .iter()
        .map(|c| c.credential_status.revocation_list_index)
        .collect();
    indexes.sort();
    assert_eq!(indexes, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(stack.credentials.credentials_for(alice.did()).len(), 6);
}

#[tokio::test]
async fn test_lost_responses_are_not_resubmitted() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;

    stack.faults.fail_next_writes(FaultMode::ApplyThenFail, 1);
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();
    assert_eq!(vc.credential_status.revocation_list_index, 0);

    stack.faults.fail_next_writes(FaultMode::ApplyThenFail, 1);
    let receipt = stack.credentials.revoke(&alice, &vc.id, "lost").await.unwrap();
    let record = stack.ledger.revocation_record(&vc.id).await.unwrap().unwrap();
    assert_eq!(record.revoked_in, Some(receipt));
    assert!(stack.credentials.verify(&vc).await.is_revoked());
}

#[tokio::test]
async fn test_fatal_ledger_error_aborts_issue() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;

    stack
        .faults
        .fail_next_writes(FaultMode::Reject(LedgerError::Unauthorized("paused".into())), 1);
    let err = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap_err();
    assert!(matches!(err, CredentialError::Ledger(LedgerError::Unauthorized(_))));
    assert!(stack.credentials.credentials_for(alice.did()).is_empty());
}

#[tokio::test]
async fn test_rotation_keeps_old_credentials_valid() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let before = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let rotated = stack.identities.rotate_keys(alice.did(), &password("p1")).await.unwrap();
    let after = stack.credentials.issue(&rotated, rotated.did(), membership()).await.unwrap();

    assert!(stack.credentials.verify(&before).await.valid);
    assert!(stack.credentials.verify(&after).await.valid);
    // revocation is authorized by the current key
    stack.credentials.revoke(&rotated, &before.id, "rotated").await.unwrap();
    assert!(stack.credentials.verify(&before).await.is_revoked());
}

#[tokio::test]
async fn test_presentation_roundtrip() {
    let stack = TestStack::new();
    let issuer = stack.unlocked("agency", "p0").await;
    let alice = stack.unlocked("alice", "p1").await;
    let kyc = stack.credentials.issue(&issuer, alice.did(), kyc_basic()).await.unwrap();
    let group = stack.credentials.issue(&issuer, alice.did(), membership()).await.unwrap();

    let vp = stack
        .credentials
        .create_presentation(&alice, vec![kyc.clone(), group], Some("nonce-1".to_string()))
        .await
        .unwrap();
    let result = stack.credentials.verify_presentation(&vp, Some("nonce-1")).await;
    assert!(result.valid, "{:?}", result.errors);

    let result = stack.credentials.verify_presentation(&vp, Some("nonce-2")).await;
    assert_eq!(result.errors, vec![VerificationError::ChallengeMismatch]);

    stack.credentials.revoke(&issuer, &kyc.id, "withdrawn").await.unwrap();
    let result = stack.credentials.verify_presentation(&vp, Some("nonce-1")).await;
    assert!(!result.valid);
    assert!(result.is_revoked());
}

#[tokio::test]
async fn test_presentation_rejects_foreign_credentials_and_tampering() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let bob = stack.unlocked("bob", "p2").await;
    let bobs = stack.credentials.issue(&alice, bob.did(), membership()).await.unwrap();

    let vp = stack
        .credentials
        .create_presentation(&alice, vec![bobs.clone()], None)
        .await
        .unwrap();
    let result = stack.credentials.verify_presentation(&vp, None).await;
    assert!(has(&result, |e| matches!(e, VerificationError::SubjectNotHolder { .. })));

    let mut tampered = stack.credentials.create_presentation(&bob, vec![bobs], None).await.unwrap();
    assert!(stack.credentials.verify_presentation(&tampered, None).await.valid);
    tampered.holder = alice.did().clone();
    let result = stack.credentials.verify_presentation(&tampered, None).await;
    assert!(has(&result, |e| matches!(e, VerificationError::UnknownVerificationMethod { .. })));
}

#[tokio::test]
async fn test_encrypted_payload_scenario() {
    let stack = TestStack::new();
    let payload = br#"{"fullName":"A","phone":"123"}"#;

    let meta = stack
        .credentials
        .store_encrypted_payload(payload, &password("p2"))
        .await
        .unwrap();
    assert!(stack.content.contains(&meta.content_id).await.unwrap());

    let plaintext = stack
        .credentials
        .load_encrypted_payload(&meta, &password("p2"))
        .await
        .unwrap();
    assert_eq!(plaintext.as_slice(), payload);

    let err = stack
        .credentials
        .load_encrypted_payload(&meta, &password("p3"))
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::DecryptionFailed));
}

#[tokio::test]
async fn test_payload_with_inflated_kdf_params_is_rejected() {
    let stack = TestStack::new();
    let mut meta = stack
        .credentials
        .store_encrypted_payload(br#"{"fullName":"A"}"#, &password("p2"))
        .await
        .unwrap();
    meta.kdf_params.iterations = u32::MAX;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        stack.credentials.load_encrypted_payload(&meta, &password("p2")),
    )
    .await
    .expect("load returned promptly");
    let err = result.unwrap_err();
    assert!(matches!(err, CredentialError::Crypto(CryptoError::KeyDerivation(_))));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_stored_payload_survives_garbage_collection() {
    let stack = TestStack::new();
    let meta = stack
        .credentials
        .store_encrypted_payload(b"passport scan", &password("p2"))
        .await
        .unwrap();
    let scratch = stack.content.put(b"unpinned").await.unwrap();

    assert_eq!(stack.content.collect_garbage().await.unwrap(), 1);
    assert!(matches!(stack.content.get(&scratch).await, Err(StorageError::NotFound(_))));
    assert!(stack
        .credentials
        .load_encrypted_payload(&meta, &password("p2"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_offline_store_surfaces_unavailable() {
    let stack = TestStack::new();
    stack.content.set_offline(true);
    let err = stack
        .credentials
        .store_encrypted_payload(b"data", &password("p2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::Storage(StorageError::Unavailable(_))));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_submit_kyc_links_credential_to_payload() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;

    let submission = stack
        .credentials
        .submit_kyc(&alice, b"{\"fullName\":\"A\"}", "IN", VerificationLevel::Enhanced)
        .await
        .unwrap();
    assert!(stack.credentials.verify(&submission.credential).await.valid);

    let CredentialClaims::Kyc(claims) = submission.credential.claims().unwrap() else {
        panic!("not a KYC credential");
    };
    assert_eq!(claims.kyc_data.as_ref(), Some(&submission.meta));
    assert_eq!(claims.verification_level, VerificationLevel::Enhanced);

    let plaintext = stack
        .credentials
        .load_encrypted_payload_with_key(&submission.meta, alice.session_key())
        .await
        .unwrap();
    assert_eq!(plaintext.as_slice(), b"{\"fullName\":\"A\"}");

    let serialized = submission.credential.to_json().unwrap();
    assert!(!serialized.contains("fullName"));
}

#[tokio::test]
async fn test_publish_and_fetch() {
    let stack = TestStack::new();
    let alice = stack.unlocked("alice", "p1").await;
    let vc = stack.credentials.issue(&alice, alice.did(), kyc_basic()).await.unwrap();

    let blob = stack.credentials.publish(&vc).await.unwrap();
    assert_eq!(blob, stack.credentials.publish(&vc).await.unwrap());
    stack.content.collect_garbage().await.unwrap();

    let fetched = stack.credentials.fetch(&blob).await.unwrap();
    assert_eq!(fetched, vc);
    assert!(stack.credentials.verify(&fetched).await.valid);
}
