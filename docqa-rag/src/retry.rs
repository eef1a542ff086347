//! Bounded retry with exponential backoff for external service calls.
//!
//! Adapters classify each failed attempt as [`CallError::Transient`] (network
//! errors, timeouts, rate limits, 5xx) or [`CallError::Permanent`]. Only
//! transient failures are retried; the final failure is returned as a message
//! for the adapter to wrap in its own [`RagError`](crate::RagError) variant.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Factor applied to the delay after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff_ms: 500, max_backoff_ms: 8_000, multiplier: 2.0 }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay to wait before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(32) as i32);
        let millis = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

/// The outcome of a single failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Worth retrying: connection failure, timeout, HTTP 429 or 5xx.
    Transient(String),
    /// Retrying cannot help: bad request, authentication, malformed body.
    Permanent(String),
}

impl CallError {
    fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Permanent(m) => m,
        }
    }
}

/// Run `call` until it succeeds, fails permanently, or the policy is exhausted.
///
/// Each transient failure is logged at `warn` with the attempt number and the
/// delay before the next attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut retry = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(CallError::Permanent(message)) => return Err(message),
            Err(err) if retry >= policy.max_retries => {
                return Err(format!("{} (gave up after {} attempts)", err.message(), retry + 1));
            }
            Err(err) => {
                let delay = policy.backoff(retry);
                warn!(
                    operation,
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = err.message(),
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}
