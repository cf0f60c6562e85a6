//! CredentialService: verifiable credentials and presentations
//!
//! Credentials are signed with Ed25519Signature2020-style proofs, carry a
//! pointer to a ledger revocation slot and are verified against the issuer's
//! DID document as registered on the ledger. Sensitive KYC data never enters
//! a credential; it is encrypted, stored off-chain and referenced by
//! [`KycEnvelopeMeta`].

pub mod credential;
pub mod errors;
mod index;
pub mod kind;
pub mod kyc;
pub mod presentation;
pub mod proof;
mod service;
pub mod verification;

#[cfg(test)]
mod tests;

pub use credential::{CredentialStatus, CredentialSubject, VerifiableCredential};
pub use errors::{CredentialError, CredentialResult};
pub use index::CredentialIndex;
pub use kind::{
    CredentialClaims, CredentialKind, EmergencyContactClaims, GroupMembershipClaims, GroupRole, KycClaims,
    TravelCompletionClaims, VerificationLevel,
};
pub use kyc::{KycEnvelopeMeta, KycSubmission};
pub use presentation::VerifiablePresentation;
pub use proof::{Proof, ProofOptions, ProofPurpose};
pub use service::CredentialService;
pub use verification::{VerificationError, VerificationResult};
