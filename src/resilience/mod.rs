//! # Resilience Module
//!
//! Fault tolerance for calls to the remote task store. Two cooperating
//! layers keep a flaky upstream from taking the read surface down with it:
//!
//! - **Retry**: bounded re-attempts with exponential backoff and a
//!   per-attempt timeout, for transient failures
//! - **Circuit breaker**: fail-fast isolation once failures stop looking
//!   transient, with lazy recovery probing after a cooldown
//!
//! The composition order matters: the breaker wraps the whole retry loop,
//! so one exhausted retry run counts as a single breaker failure.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use analytics_core::resilience::{
//!     CircuitBreaker, CircuitBreakerConfig, RetryExecutor, RetryPolicy,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new("task-store", CircuitBreakerConfig::default());
//! let retry = RetryExecutor::new("fetch-tasks", RetryPolicy {
//!     retries: 3,
//!     base_delay: Duration::from_millis(1000),
//!     attempt_timeout: Duration::from_secs(5),
//! });
//!
//! let tasks: Vec<String> = breaker
//!     .call(|| retry.execute(|| async { Ok::<_, String>(vec![]) }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
};
pub use retry::{AttemptError, RetryError, RetryExecutor, RetryPolicy};
