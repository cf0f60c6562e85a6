//! Confirmation waiting and status-checked retries for ledger writes
//!
//! A write whose outcome is unknown (network error after submission,
//! cancelled future) may already be on chain. Before every submission,
//! including a resubmission after cancellation, the caller-supplied status
//! query is consulted; only if it reports nothing is the write sent again.

use super::errors::{LedgerError, LedgerResult};
use super::types::TxReceipt;
use super::LedgerClient;
use crate::config::LedgerConfig;
use crate::metrics::{record_counter, LEDGER_RETRIES};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub required_confirmations: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
            required_confirmations: config.required_confirmations,
            confirmation_timeout: config.confirmation_timeout,
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

/// Submit a write, retrying retryable failures only after `status` shows the
/// write did not land.
///
/// `status` returns `Some(receipt)` when the effect of the write is already
/// visible on the ledger.
pub async fn submit_with_status_check<T, S, SFut, W, WFut>(
    policy: &RetryPolicy,
    operation: &str,
    mut status: S,
    mut submit: W,
) -> LedgerResult<T>
where
    S: FnMut() -> SFut,
    SFut: Future<Output = LedgerResult<Option<T>>>,
    W: FnMut() -> WFut,
    WFut: Future<Output = LedgerResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match status().await {
            Ok(Some(existing)) => {
                debug!(operation, attempt, "write already on ledger");
                return Ok(existing);
            }
            Ok(None) => {}
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(operation, attempt, error = %e, "status check failed, backing off");
                record_counter(LEDGER_RETRIES, 1);
                sleep(policy.delay_for(attempt)).await;
                continue;
            }
            Err(e) => return Err(e),
        }

        match submit().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(operation, attempt, error = %e, "ledger write failed, checking status before retry");
                record_counter(LEDGER_RETRIES, 1);
                sleep(policy.delay_for(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll until `receipt` has `required` confirmations
pub async fn await_confirmations(
    ledger: &dyn LedgerClient,
    receipt: &TxReceipt,
    required: u64,
    timeout: Duration,
    poll_interval: Duration,
) -> LedgerResult<u64> {
    let deadline = Instant::now() + timeout;
    loop {
        if ledger.transaction(&receipt.tx_hash).await?.is_some() {
            let head = ledger.current_block().await?;
            let confirmations = (head + 1).saturating_sub(receipt.block_number);
            if confirmations >= required {
                return Ok(confirmations);
            }
        }
        if Instant::now() >= deadline {
            return Err(LedgerError::Timeout(format!(
                "{} not confirmed {} times within {:?}",
                receipt.tx_hash, required, timeout
            )));
        }
        sleep(poll_interval).await;
    }
}

/// [`await_confirmations`] with the policy's settings
pub async fn confirm(ledger: &dyn LedgerClient, receipt: &TxReceipt, policy: &RetryPolicy) -> LedgerResult<u64> {
    await_confirmations(
        ledger,
        receipt,
        policy.required_confirmations,
        policy.confirmation_timeout,
        policy.poll_interval,
    )
    .await
}
