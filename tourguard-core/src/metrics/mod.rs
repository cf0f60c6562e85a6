//! Metrics for observability
//!
//! Only the `metrics` facade is used here; installing a recorder/exporter is
//! left to the embedding application. Without one, recording is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const IDENTITY_CREATED: &str = "identity.created";
pub const IDENTITY_UNLOCK_SUCCESS: &str = "identity.unlock.success";
pub const IDENTITY_UNLOCK_FAILED: &str = "identity.unlock.failed";
pub const CREDENTIAL_ISSUED: &str = "credential.issued";
pub const CREDENTIAL_VERIFIED_VALID: &str = "credential.verified.valid";
pub const CREDENTIAL_VERIFIED_INVALID: &str = "credential.verified.invalid";
pub const CREDENTIAL_REVOKED: &str = "credential.revoked";
pub const CONTENT_PUT: &str = "content.put";
pub const CONTENT_GET: &str = "content.get";
pub const LEDGER_WRITES: &str = "ledger.writes";
pub const LEDGER_RETRIES: &str = "ledger.retries";
pub const KDF_DURATION_MS: &str = "crypto.kdf.duration_ms";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Identity metrics
    describe_counter!(IDENTITY_CREATED, "Identities created and registered");
    describe_counter!(IDENTITY_UNLOCK_SUCCESS, "Successful identity unlocks");
    describe_counter!(IDENTITY_UNLOCK_FAILED, "Failed identity unlocks");

    // Credential metrics
    describe_counter!(CREDENTIAL_ISSUED, "Credentials issued");
    describe_counter!(CREDENTIAL_VERIFIED_VALID, "Verifications with a valid outcome");
    describe_counter!(CREDENTIAL_VERIFIED_INVALID, "Verifications with an invalid outcome");
    describe_counter!(CREDENTIAL_REVOKED, "Credentials revoked");

    // Storage and ledger metrics
    describe_counter!(CONTENT_PUT, "Blobs written to the content store");
    describe_counter!(CONTENT_GET, "Blobs read from the content store");
    describe_counter!(LEDGER_WRITES, "Ledger write submissions");
    describe_counter!(LEDGER_RETRIES, "Ledger write retries after a status check");

    describe_histogram!(KDF_DURATION_MS, "Password key derivation duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration in milliseconds
    pub fn stop(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.name).record(elapsed_ms);
        elapsed_ms
    }
}
