//! # Retry Execution
//!
//! Bounded retry with exponential backoff for calls to the remote task
//! store. Each attempt runs under its own timeout so a hung connection is
//! indistinguishable from a failed one, and the loop suspends between
//! attempts without blocking the runtime.
//!
//! The breaker sits outside this layer: one `RetryExecutor::execute` run is
//! a single protected operation from the circuit breaker's point of view,
//! however many attempts it took internally.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

/// Attempt and backoff parameters for a retried operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of additional attempts made after the first failure; the
    /// total number of attempts is `retries + 1`
    pub retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,
    /// Budget for a single attempt; an elapsed attempt counts as a failure
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `retry` (1-based): `base_delay * 2^(retry - 1)`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Total attempts this policy will make, counting the first one.
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// How a single attempt failed
#[derive(Debug, thiserror::Error)]
pub enum AttemptError<E> {
    /// The attempt did not complete within the per-attempt budget
    #[error("Attempt timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// The operation itself returned an error
    #[error("{0}")]
    Failed(E),
}

/// All attempts failed; carries the final attempt's cause
#[derive(Debug, thiserror::Error)]
#[error("Operation failed after {attempts} attempts: {last}")]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: AttemptError<E>,
}

/// Drives an operation through the retry loop described by a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    /// Operation name for logging
    name: String,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying per the policy until it succeeds or the
    /// attempt budget is exhausted.
    ///
    /// The factory is invoked once per attempt; abandoned attempts are not
    /// cancelled early, they run into their own timeout and are discarded.
    pub async fn execute<F, T, E, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.policy.max_attempts();
        let timeout_ms = self.policy.attempt_timeout.as_millis() as u64;
        let mut attempt = 1u32;

        loop {
            debug!(
                operation = %self.name,
                attempt = attempt,
                max_attempts = max_attempts,
                "Starting attempt"
            );

            let failure = match timeout(self.policy.attempt_timeout, operation()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(
                            operation = %self.name,
                            attempt = attempt,
                            "Succeeded after retrying"
                        );
                    }
                    return Ok(value);
                }
                Ok(Err(err)) => AttemptError::Failed(err),
                Err(_) => AttemptError::TimedOut { timeout_ms },
            };

            if attempt >= max_attempts {
                error!(
                    operation = %self.name,
                    attempts = attempt,
                    error = %failure,
                    "Exhausted all retries"
                );
                return Err(RetryError {
                    attempts: attempt,
                    last: failure,
                });
            }

            // Exponential backoff: base, 2x, 4x, ...
            let delay = self.policy.backoff_delay(attempt);
            warn!(
                operation = %self.name,
                error = %failure,
                retry = attempt,
                max_retries = self.policy.retries,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, will retry"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
