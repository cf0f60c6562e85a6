//! Session lifecycle scenarios

use super::*;
use crate::core_credential::{CredentialClaims, KycClaims, VerificationError};
use crate::core_identity::{IdentityManager, IdentityState, MemoryKeystore};
use crate::test_utils::{fast_crypto, password, test_ledger_config, TestStack};

fn kyc_basic() -> CredentialClaims {
    CredentialClaims::Kyc(KycClaims {
        nationality: "IN".to_string(),
        verification_level: VerificationLevel::Basic,
        kyc_data: None,
    })
}

async fn unlocked_wallet(stack: &TestStack, alias: &str, pw: &str) -> (SessionWallet, Identity) {
    let identity = stack.identities.create(alias, &password(pw)).await.unwrap();
    let wallet = stack.wallet();
    wallet.unlock(&identity.identifier, &password(pw)).await.unwrap();
    (wallet, identity)
}

#[tokio::test]
async fn test_calls_without_session_fail() {
    let stack = TestStack::new();
    let identity = stack.identities.create("alice", &password("p1")).await.unwrap();
    let wallet = stack.wallet();

    assert!(wallet.current_identity().await.is_none());
    assert!(matches!(
        wallet.issue(&identity.identifier, kyc_basic()).await,
        Err(SessionError::NoActiveSession)
    ));
    assert!(matches!(wallet.sign(b"hello").await, Err(SessionError::NoActiveSession)));
    assert!(matches!(wallet.credentials().await, Err(SessionError::NoActiveSession)));
    assert!(matches!(
        wallet.export_backup(&password("p1")).await,
        Err(SessionError::NoActiveSession)
    ));
}

#[tokio::test]
async fn test_wrong_password_is_a_session_error() {
    let stack = TestStack::new();
    let identity = stack.identities.create("alice", &password("p1")).await.unwrap();
    let wallet = stack.wallet();

    let err = wallet.unlock(&identity.identifier, &password("nope")).await.unwrap_err();
    assert!(matches!(err, SessionError::WrongPassword));
    assert_eq!(err.user_message(), "unable to unlock");
    assert!(wallet.current_identity().await.is_none());
    assert_eq!(stack.identities.state(&identity.identifier), IdentityState::Registered);
}

#[tokio::test]
async fn test_unlock_lock_cycle() {
    let stack = TestStack::new();
    let (wallet, identity) = unlocked_wallet(&stack, "alice", "p1").await;

    assert_eq!(wallet.current_identity().await.unwrap(), identity);
    assert_eq!(stack.identities.state(&identity.identifier), IdentityState::Loaded);

    wallet.lock().await;
    assert!(!wallet.is_unlocked().await);
    assert_eq!(stack.identities.state(&identity.identifier), IdentityState::Locked);

    let again = wallet.unlock_alias("alice", &password("p1")).await.unwrap();
    assert_eq!(again.identifier, identity.identifier);
}

#[tokio::test]
async fn test_unlocking_another_identity_replaces_session() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;
    let bob = stack.identities.create("bob", &password("p2")).await.unwrap();

    wallet.unlock(&bob.identifier, &password("p2")).await.unwrap();
    assert_eq!(wallet.current_identity().await.unwrap().identifier, bob.identifier);
    assert_eq!(stack.identities.state(&alice.identifier), IdentityState::Locked);
}

#[tokio::test]
async fn test_end_to_end_kyc_scenario() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;

    let vc = wallet.issue(&alice.identifier, kyc_basic()).await.unwrap();
    let result = wallet.verify(&vc).await;
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(vc.claim("verificationLevel").unwrap(), "basic");
    assert_eq!(wallet.credentials().await.unwrap(), vec![vc.clone()]);

    wallet.revoke(&vc.id, "re-verification required", &password("p1")).await.unwrap();
    let result = wallet.verify(&vc).await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, VerificationError::Revoked { .. })));
}

#[tokio::test]
async fn test_revoke_requires_reauthentication() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;
    let vc = wallet.issue(&alice.identifier, kyc_basic()).await.unwrap();

    let err = wallet.revoke(&vc.id, "oops", &password("p2")).await.unwrap_err();
    assert!(matches!(err, SessionError::WrongPassword));
    assert!(wallet.verify(&vc).await.valid);
}

#[tokio::test]
async fn test_kyc_payload_with_password() {
    let stack = TestStack::new();
    let (wallet, _) = unlocked_wallet(&stack, "alice", "p1").await;
    let payload = br#"{"fullName":"A","phone":"123"}"#;

    let meta = wallet.store_kyc_payload(payload, &password("p2")).await.unwrap();
    let plaintext = wallet.load_kyc_payload(&meta, &password("p2")).await.unwrap();
    assert_eq!(plaintext.as_slice(), payload);

    let err = wallet.load_kyc_payload(&meta, &password("p3")).await.unwrap_err();
    assert!(matches!(err, SessionError::Credential(CredentialError::DecryptionFailed)));
    assert_eq!(err.user_message(), "unable to decrypt");
}

#[tokio::test]
async fn test_own_kyc_survives_relock() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;

    let submission = wallet
        .submit_kyc(b"passport: X1234567", "IN", VerificationLevel::Full)
        .await
        .unwrap();
    assert_eq!(wallet.credentials().await.unwrap().len(), 1);

    wallet.lock().await;
    assert!(matches!(
        wallet.decrypt_own_kyc(&submission.meta).await,
        Err(SessionError::NoActiveSession)
    ));

    wallet.unlock(&alice.identifier, &password("p1")).await.unwrap();
    let plaintext = wallet.decrypt_own_kyc(&submission.meta).await.unwrap();
    assert_eq!(plaintext.as_slice(), b"passport: X1234567");
    // credentials issued during the earlier session are still listed
    assert_eq!(wallet.credentials().await.unwrap()[0].id, submission.credential.id);
}

#[tokio::test]
async fn test_accept_and_present() {
    let stack = TestStack::new();
    let (agency, _) = unlocked_wallet(&stack, "agency", "p0").await;
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;

    let vc = agency.issue(&alice.identifier, kyc_basic()).await.unwrap();
    wallet.accept_credential(vc.clone()).await.unwrap();

    let vp = wallet.present(&[vc.id.clone()], Some("gate-7".into())).await.unwrap();
    assert_eq!(vp.verifiable_credential, vec![vc.clone()]);
    assert!(agency.verify_presentation(&vp, Some("gate-7")).await.valid);

    let err = agency.accept_credential(vc).await.unwrap_err();
    assert!(matches!(err, SessionError::Credential(CredentialError::Unauthorized(_))));
}

#[tokio::test]
async fn test_sealed_emergency_details() {
    let stack = TestStack::new();
    let (alice, _) = unlocked_wallet(&stack, "alice", "p1").await;
    let (bob, bob_identity) = unlocked_wallet(&stack, "bob", "p2").await;

    let sealed = alice
        .seal_for(&bob_identity.identifier, b"blood type O+, allergy: penicillin")
        .await
        .unwrap();
    let opened = bob.open_sealed(&sealed).await.unwrap();
    assert_eq!(opened.as_slice(), b"blood type O+, allergy: penicillin");

    assert!(matches!(alice.open_sealed(&sealed).await, Err(SessionError::Crypto(_))));
}

#[tokio::test]
async fn test_signatures_verify_against_document() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;

    let signature = wallet.sign(b"check-in 09:30").await.unwrap();
    let document = stack.identities.resolve(&alice.identifier).await.unwrap();
    let key = document.controller_key().unwrap();
    assert!(stack.identities.crypto().verify(b"check-in 09:30", &signature, key));
}

#[tokio::test]
async fn test_rotate_keys_keeps_session() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;
    let before = wallet.issue(&alice.identifier, kyc_basic()).await.unwrap();

    assert!(matches!(
        wallet.rotate_keys(&password("wrong")).await,
        Err(SessionError::WrongPassword)
    ));
    let rotated = wallet.rotate_keys(&password("p1")).await.unwrap();
    assert_eq!(rotated.identifier, alice.identifier);
    assert_ne!(rotated.controller_key, alice.controller_key);

    let signature = wallet.sign(b"after rotation").await.unwrap();
    let document = stack.identities.resolve(&alice.identifier).await.unwrap();
    assert!(document.controller_key().unwrap().verify(b"after rotation", &signature));

    assert!(wallet.verify(&before).await.valid);
    wallet.revoke(&before.id, "rotated", &password("p1")).await.unwrap();
}

#[tokio::test]
async fn test_export_backup_requires_password() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;

    assert!(matches!(
        wallet.export_backup(&password("p2")).await,
        Err(SessionError::WrongPassword)
    ));
    let backup = wallet.export_backup(&password("p1")).await.unwrap();
    assert_eq!(backup.identifier, alice.identifier);

    let device2 = IdentityManager::new(
        fast_crypto(),
        stack.faults.clone(),
        Arc::new(MemoryKeystore::new()),
        &test_ledger_config(),
    );
    device2.import_backup(backup, &password("p1")).await.unwrap();
    assert!(device2.load(&alice.identifier, &password("p1")).await.is_ok());
}

#[tokio::test]
async fn test_wipe_removes_local_identity() {
    let stack = TestStack::new();
    let (wallet, alice) = unlocked_wallet(&stack, "alice", "p1").await;
    let vc = wallet.issue(&alice.identifier, kyc_basic()).await.unwrap();

    assert!(matches!(wallet.wipe(&password("p2")).await, Err(SessionError::WrongPassword)));
    assert!(wallet.is_unlocked().await);

    wallet.wipe(&password("p1")).await.unwrap();
    assert!(!wallet.is_unlocked().await);
    assert_eq!(stack.identities.state(&alice.identifier), IdentityState::Uninitialized);
    assert!(stack.credentials.credentials_for(&alice.identifier).is_empty());
    assert!(wallet.unlock(&alice.identifier, &password("p1")).await.is_err());

    // the DID and its credentials remain verifiable from the ledger
    assert!(stack.identities.resolve(&alice.identifier).await.is_ok());
    assert!(wallet.verify(&vc).await.valid);
}
