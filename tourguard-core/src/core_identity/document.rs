//! DID documents
//!
//! Each identity publishes one Ed25519 key (authentication + assertion) and
//! one X25519 key-agreement key. Key ids carry a generation number that is
//! bumped on rotation: `#key-1`, `#key-agreement-1`, then `#key-2`, ...

use super::did::Did;
use crate::core_crypto::hashing::hash;
use crate::core_crypto::{KeyAlgorithm, PublicKey};
use serde::{Deserialize, Serialize};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";

/// A public key entry (`verificationMethod`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub algorithm: KeyAlgorithm,
    pub controller: Did,
    pub public_key_multibase: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub service_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: Did,
    pub controller: Did,
    pub verification_method: Vec<VerificationMethod>,
    pub authentication: Vec<String>,
    pub assertion_method: Vec<String>,
    pub key_agreement: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceEndpoint>,
}

impl DidDocument {
    pub fn new(did: &Did, signing_key: &PublicKey, agreement_key: &PublicKey, generation: u32) -> Self {
        let signing_id = did.key_url(&format!("key-{}", generation));
        let agreement_id = did.key_url(&format!("key-agreement-{}", generation));
        Self {
            context: vec![DID_CONTEXT.to_string(), ED25519_2020_CONTEXT.to_string()],
            id: did.clone(),
            controller: did.clone(),
            verification_method: vec![
                VerificationMethod {
                    id: signing_id.clone(),
                    algorithm: signing_key.algorithm(),
                    controller: did.clone(),
                    public_key_multibase: *signing_key,
                },
                VerificationMethod {
                    id: agreement_id.clone(),
                    algorithm: agreement_key.algorithm(),
                    controller: did.clone(),
                    public_key_multibase: *agreement_key,
                },
            ],
            authentication: vec![signing_id.clone()],
            assertion_method: vec![signing_id],
            key_agreement: vec![agreement_id],
            service: Vec::new(),
        }
    }

    pub fn with_service(mut self, kind: &str, endpoint: &str) -> Self {
        let id = self.id.key_url(&format!("service-{}", self.service.len() + 1));
        self.service.push(ServiceEndpoint {
            id,
            kind: kind.to_string(),
            service_endpoint: endpoint.to_string(),
        });
        self
    }

    /// Keep earlier signing keys as assertion methods so credentials issued
    /// before a rotation still verify
    pub fn retain_assertion_keys(mut self, previous: &DidDocument) -> Self {
        for id in &previous.assertion_method {
            if self.assertion_method.contains(id) {
                continue;
            }
            if let Some(method) = previous.find_key(id).filter(|m| m.algorithm == KeyAlgorithm::Ed25519) {
                self.verification_method.push(method.clone());
                self.assertion_method.push(id.clone());
            }
        }
        self
    }

    pub fn find_key(&self, key_url: &str) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|m| m.id == key_url)
    }

    /// Current controller key (first authentication method)
    pub fn controller_method(&self) -> Option<&VerificationMethod> {
        self.authentication
            .first()
            .and_then(|id| self.find_key(id))
            .filter(|m| m.algorithm == KeyAlgorithm::Ed25519)
    }

    pub fn controller_key(&self) -> Option<&PublicKey> {
        self.controller_method().map(|m| &m.public_key_multibase)
    }

    /// Key usable for `assertionMethod` proofs at `key_url`
    pub fn assertion_key(&self, key_url: &str) -> Option<&PublicKey> {
        if !self.assertion_method.iter().any(|id| id == key_url) {
            return None;
        }
        self.find_key(key_url)
            .filter(|m| m.algorithm == KeyAlgorithm::Ed25519)
            .map(|m| &m.public_key_multibase)
    }

    /// Key usable for `authentication` proofs at `key_url`
    pub fn authentication_key(&self, key_url: &str) -> Option<&PublicKey> {
        if !self.authentication.iter().any(|id| id == key_url) {
            return None;
        }
        self.find_key(key_url)
            .filter(|m| m.algorithm == KeyAlgorithm::Ed25519)
            .map(|m| &m.public_key_multibase)
    }

    pub fn agreement_key(&self) -> Option<&PublicKey> {
        self.key_agreement
            .first()
            .and_then(|id| self.find_key(id))
            .filter(|m| m.algorithm == KeyAlgorithm::X25519)
            .map(|m| &m.public_key_multibase)
    }

    /// Key generation encoded in the controller key id (`#key-N`)
    pub fn generation(&self) -> u32 {
        self.authentication
            .first()
            .and_then(|id| id.rsplit_once("#key-"))
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or(1)
    }

    /// Canonical bytes: compact JSON in declaration order
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Document hash anchored on the ledger
    pub fn hash(&self) -> [u8; 32] {
        hash(&self.canonical_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::KeyPair;

    fn document() -> (KeyPair, KeyPair, DidDocument) {
        let signing = KeyPair::generate(KeyAlgorithm::Ed25519);
        let agreement = KeyPair::generate(KeyAlgorithm::X25519);
        let did = Did::from_public_key("tourguard", "testnet", signing.public_key());
        let doc = DidDocument::new(&did, signing.public_key(), agreement.public_key(), 1);
        (signing, agreement, doc)
    }

    #[test]
    fn test_new_document_keys() {
        let (signing, agreement, doc) = document();
        assert_eq!(doc.controller_key(), Some(signing.public_key()));
        assert_eq!(doc.agreement_key(), Some(agreement.public_key()));
        assert_eq!(doc.generation(), 1);
        assert!(doc.key_agreement[0].ends_with("#key-agreement-1"));
    }

    #[test]
    fn test_assertion_key_requires_assertion_relationship() {
        let (signing, _, doc) = document();
        let key_id = doc.assertion_method[0].clone();
        assert_eq!(doc.assertion_key(&key_id), Some(signing.public_key()));
        let agreement_id = doc.key_agreement[0].clone();
        assert_eq!(doc.assertion_key(&agreement_id), None);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let (_, _, doc) = document();
        let with_service = doc.clone().with_service("EmergencyHotline", "tel:+911122334455");
        assert_eq!(doc.hash(), doc.clone().hash());
        assert_ne!(doc.hash(), with_service.hash());
    }

    #[test]
    fn test_retained_assertion_keys_after_rotation() {
        let (old_signing, _, old_doc) = document();
        let signing = KeyPair::generate(KeyAlgorithm::Ed25519);
        let agreement = KeyPair::generate(KeyAlgorithm::X25519);
        let rotated = DidDocument::new(&old_doc.id, signing.public_key(), agreement.public_key(), 2)
            .retain_assertion_keys(&old_doc);

        assert_eq!(rotated.controller_key(), Some(signing.public_key()));
        assert_eq!(rotated.generation(), 2);
        assert_eq!(rotated.assertion_key(&old_doc.assertion_method[0]), Some(old_signing.public_key()));
        // old key can no longer authenticate
        assert_eq!(rotated.authentication_key(&old_doc.authentication[0]), None);
        assert_eq!(rotated.key_agreement.len(), 1);
    }

    #[test]
    fn test_json_shape() {
        let (_, _, doc) = document();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["@context"][0], DID_CONTEXT);
        assert_eq!(json["verificationMethod"][0]["type"], "Ed25519VerificationKey2020");
        assert_eq!(json["verificationMethod"][1]["type"], "X25519KeyAgreementKey2020");
        assert!(json["verificationMethod"][0]["publicKeyMultibase"].as_str().unwrap().starts_with('z'));
        assert!(json.get("service").is_none());

        let back: DidDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.hash(), doc.hash());
    }
}
