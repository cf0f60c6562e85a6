//! Local per-subject credential lists

use super::credential::VerifiableCredential;
use crate::core_identity::Did;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct CredentialIndex {
    by_subject: RwLock<HashMap<Did, Vec<VerifiableCredential>>>,
}

impl CredentialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the subject's list; returns false if the id is already there
    pub fn append(&self, credential: VerifiableCredential) -> bool {
        let mut map = self.by_subject.write().unwrap_or_else(|p| p.into_inner());
        let list = map.entry(credential.subject().clone()).or_default();
        if list.iter().any(|c| c.id == credential.id) {
            return false;
        }
        list.push(credential);
        true
    }

    pub fn for_subject(&self, subject: &Did) -> Vec<VerifiableCredential> {
        self.by_subject
            .read()
            .map(|m| m.get(subject).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn get(&self, credential_id: &str) -> Option<VerifiableCredential> {
        let map = self.by_subject.read().ok()?;
        map.values().flatten().find(|c| c.id == credential_id).cloned()
    }

    /// Drop everything held for `subject`
    pub fn forget(&self, subject: &Did) {
        if let Ok(mut map) = self.by_subject.write() {
            map.remove(subject);
        }
    }

    pub fn len(&self) -> usize {
        self.by_subject.read().map(|m| m.values().map(Vec::len).sum()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_credential::credential::CredentialStatus;
    use crate::core_credential::kind::{CredentialClaims, TravelCompletionClaims};
    use crate::core_crypto::{KeyAlgorithm, KeyPair};
    use chrono::Utc;

    fn did() -> Did {
        Did::from_public_key("tourguard", "testnet", KeyPair::generate(KeyAlgorithm::Ed25519).public_key())
    }

    fn credential(id: &str, subject: &Did) -> VerifiableCredential {
        let claims = CredentialClaims::TravelCompletion(TravelCompletionClaims {
            trip_id: "trip-9".into(),
            destination: "Jaipur".into(),
            completed_at: Utc::now(),
        });
        VerifiableCredential::unsigned(
            id.to_string(),
            did(),
            subject.clone(),
            &claims,
            Utc::now(),
            None,
            CredentialStatus::new("default", 0),
        )
        .unwrap()
    }

    #[test]
    fn test_append_dedupes_by_id() {
        let index = CredentialIndex::new();
        let subject = did();
        assert!(index.append(credential("urn:uuid:a", &subject)));
        assert!(!index.append(credential("urn:uuid:a", &subject)));
        assert!(index.append(credential("urn:uuid:b", &subject)));
        assert_eq!(index.for_subject(&subject).len(), 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_lookup_and_forget() {
        let index = CredentialIndex::new();
        let (alice, bob) = (did(), did());
        index.append(credential("urn:uuid:a", &alice));
        index.append(credential("urn:uuid:b", &bob));

        assert_eq!(index.get("urn:uuid:b").unwrap().subject(), &bob);
        index.forget(&alice);
        assert!(index.for_subject(&alice).is_empty());
        assert!(index.get("urn:uuid:a").is_none());
        assert_eq!(index.len(), 1);
    }
}
