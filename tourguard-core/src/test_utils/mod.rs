//! Shared test fixtures
//!
//! Cheap KDF parameters, a fully wired service stack and a ledger wrapper
//! that injects failures.

pub mod faults;
pub mod fixtures;

pub use faults::{FaultMode, FaultyLedger};
pub use fixtures::*;
