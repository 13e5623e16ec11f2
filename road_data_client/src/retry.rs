//! Fixed-delay retry for timeout-class failures.
//!
//! Only errors for which [`ClientError::is_transient`] holds are retried; data
//! errors are returned on the first occurrence. The policy counts total
//! attempts, so the default of 3 means one call plus two retries.

use std::{future::Future, time::Duration};

use tracing::warn;

use crate::errors::ClientError;

/// Bounded attempts with a fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call. Zero behaves like one.
    pub attempts: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from raw settings.
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up. The last error is returned in the latter cases.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let max = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < max => {
                    warn!(
                        operation,
                        attempt,
                        retries_left = max - attempt,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
