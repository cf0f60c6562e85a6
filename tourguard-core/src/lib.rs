//! TourGuard core: decentralized identity and verifiable credentials
//!
//! Layering, leaf first:
//!
//! ```text
//! ┌────────────────────────────┐
//! │   core_wallet (session)    │
//! └──────┬──────────────┬──────┘
//!        │              │
//! ┌──────▼──────┐ ┌─────▼───────────┐
//! │core_identity│◄┤ core_credential │
//! └──┬───────┬──┘ └──┬──────────┬───┘
//!    │       │       │          │
//!    ▼       ▼       ▼          ▼
//!  crypto  ledger  ledger     content
//! ```
//!
//! Every service is constructed explicitly and receives its collaborators
//! (`Arc<dyn LedgerClient>`, `Arc<dyn ContentStore>`, keystores) at
//! construction time. There is no process-wide state apart from the
//! optional logging/metrics installation.

pub mod config;
pub mod core_content;
pub mod core_credential;
pub mod core_crypto;
pub mod core_identity;
pub mod core_ledger;
pub mod core_wallet;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use core_content::{ContentId, ContentStore, FileContentStore, MemoryContentStore, StoredBlobRef};
pub use core_credential::{
    CredentialClaims, CredentialError, CredentialKind, CredentialService, KycEnvelopeMeta, KycSubmission,
    VerifiableCredential, VerifiablePresentation, VerificationError, VerificationLevel, VerificationResult,
};
pub use core_crypto::CryptoService;
pub use core_identity::{
    Did, DidDocument, FileKeystore, Identity, IdentityBackup, IdentityManager, IdentityState, Keystore, MemoryKeystore,
    UnlockedIdentity,
};
pub use core_ledger::{InMemoryLedger, LedgerClient, TxReceipt};
pub use core_wallet::{SessionError, SessionWallet};
pub use error::{Error, Result};
pub use logging::{init_logging, LogLevel};
