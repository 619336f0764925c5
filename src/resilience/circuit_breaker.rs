//! # Circuit Breaker Implementation
//!
//! Fault isolation for the pull path. The breaker follows the classic
//! three-state pattern: Closed (normal operation), Open (failing fast), and
//! Half-Open (testing recovery).
//!
//! All bookkeeping lives in a single mutex-guarded context so that every
//! check-then-transition sequence is one critical section; concurrent
//! half-open probes cannot double-close the circuit on partial success
//! counts. The protected operation itself always runs outside the lock.
//!
//! There is no background timer: an Open circuit moves to Half-Open lazily,
//! on the first call that arrives after the reset timeout has elapsed.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - trial calls allowed to probe system health
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and timing for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip a Closed circuit
    pub failure_threshold: u32,
    /// Cooldown before an Open circuit admits a trial call
    pub reset_timeout: Duration,
    /// Consecutive trial successes that close a Half-Open circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen {
        component: String,
        state: CircuitState,
    },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Point-in-time view of the breaker's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// The mutable breaker bookkeeping; owned exclusively by the mutex.
#[derive(Debug)]
struct BreakerContext {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
}

impl BreakerContext {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
        }
    }
}

/// Core circuit breaker implementation with mutex-guarded state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging
    name: String,

    /// Configuration parameters
    config: CircuitBreakerConfig,

    /// All mutable state behind one lock; never held across an await
    context: Mutex<BreakerContext>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            context: Mutex::new(BreakerContext::new()),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.context.lock().state
    }

    /// Get a snapshot of the breaker's current bookkeeping
    pub fn status(&self) -> BreakerStatus {
        let ctx = self.context.lock();
        BreakerStatus {
            state: ctx.state,
            consecutive_failures: ctx.consecutive_failures,
            consecutive_successes: ctx.consecutive_successes,
        }
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// When the circuit is Open and the reset timeout has not elapsed, the
    /// operation is never invoked and the caller gets
    /// [`CircuitBreakerError::CircuitOpen`] immediately.
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(state) = self.try_acquire() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
                state,
            });
        }

        // Execute the operation outside the lock
        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Manually force the circuit closed, zeroing all counters
    ///
    /// Operator escape hatch for when the upstream is known to be healthy
    /// again and waiting out the cooldown is not acceptable.
    pub fn reset(&self) {
        let mut ctx = self.context.lock();
        ctx.state = CircuitState::Closed;
        ctx.consecutive_failures = 0;
        ctx.consecutive_successes = 0;
        ctx.last_failure_at = None;

        warn!(component = %self.name, "🚨 Circuit breaker manually reset to closed");
    }

    /// Decide whether a call may proceed; one critical section covering the
    /// read, the elapsed-time check, and the lazy Open -> HalfOpen move.
    fn try_acquire(&self) -> Result<(), CircuitState> {
        let mut ctx = self.context.lock();
        match ctx.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let cooled_down = match ctx.last_failure_at {
                    Some(failed_at) => failed_at.elapsed() >= self.config.reset_timeout,
                    None => {
                        // Open without a timestamp shouldn't happen; admit the call
                        warn!(component = %self.name, "Circuit open but no failure timestamp recorded");
                        true
                    }
                };

                if cooled_down {
                    self.enter_half_open(&mut ctx);
                    Ok(())
                } else {
                    Err(CircuitState::Open)
                }
            }
        }
    }

    /// Record a successful operation
    fn record_success(&self, duration: Duration) {
        let mut ctx = self.context.lock();
        ctx.consecutive_failures = 0;

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "🟢 Operation succeeded"
        );

        match ctx.state {
            CircuitState::HalfOpen => {
                ctx.consecutive_successes += 1;
                if ctx.consecutive_successes >= self.config.success_threshold {
                    self.enter_closed(&mut ctx);
                }
            }
            CircuitState::Closed => {}
            CircuitState::Open => {
                // Shouldn't happen, but log it
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed operation
    fn record_failure(&self, duration: Duration) {
        let mut ctx = self.context.lock();
        ctx.consecutive_failures += 1;
        ctx.consecutive_successes = 0;
        ctx.last_failure_at = Some(Instant::now());

        error!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            consecutive_failures = ctx.consecutive_failures,
            "🔴 Operation failed"
        );

        match ctx.state {
            // Any failure during a trial immediately reopens the circuit
            CircuitState::HalfOpen => self.enter_open(&mut ctx),
            CircuitState::Closed => {
                if ctx.consecutive_failures >= self.config.failure_threshold {
                    self.enter_open(&mut ctx);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Transition to closed state (normal operation); caller holds the lock
    fn enter_closed(&self, ctx: &mut BreakerContext) {
        ctx.state = CircuitState::Closed;
        ctx.consecutive_failures = 0;
        ctx.consecutive_successes = 0;
        ctx.last_failure_at = None;

        info!(component = %self.name, "🟢 Circuit breaker closed (recovered)");
    }

    /// Transition to open state (failing fast); caller holds the lock
    fn enter_open(&self, ctx: &mut BreakerContext) {
        ctx.state = CircuitState::Open;
        ctx.consecutive_successes = 0;

        error!(
            component = %self.name,
            consecutive_failures = ctx.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Transition to half-open state (testing recovery); caller holds the lock
    fn enter_half_open(&self, ctx: &mut BreakerContext) {
        ctx.state = CircuitState::HalfOpen;
        ctx.consecutive_successes = 0;

        info!(
            component = %self.name,
            success_threshold = self.config.success_threshold,
            "🟡 Circuit breaker half-open (testing recovery)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    fn quick_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(50),
            success_threshold: 2,
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let circuit = CircuitBreaker::new("test", quick_config());

        // Should start in closed state
        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());

        let status = circuit.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_consecutive_failures() {
        let circuit = CircuitBreaker::new("test", quick_config());

        for _ in 0..2 {
            let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
            assert_eq!(circuit.state(), CircuitState::Closed);
        }

        // Third consecutive failure trips the breaker
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        // Next call fails fast without executing
        let result = circuit
            .call(|| async { Ok::<_, String>("should not execute") })
            .await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let circuit = CircuitBreaker::new("test", quick_config());

        for _ in 0..2 {
            let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        }
        let _ = circuit.call(|| async { Ok::<_, String>("ok") }).await;

        // The streak restarted, so two more failures stay below threshold
        for _ in 0..2 {
            let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        }
        assert_eq!(circuit.state(), CircuitState::Closed);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_circuit_breaker_recovery_cycle() {
        let circuit = CircuitBreaker::new("test", quick_config());

        for _ in 0..3 {
            let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        }
        assert_eq!(circuit.state(), CircuitState::Open);

        // Wait out the cooldown
        sleep(Duration::from_millis(60)).await;

        // First trial succeeds but one success is not enough to close
        let result = circuit.call(|| async { Ok::<_, String>("probe") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        // Second consecutive success closes the circuit with clean counters
        let result = circuit.call(|| async { Ok::<_, String>("probe") }).await;
        assert!(result.is_ok());

        let status = circuit.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.consecutive_successes, 0);
    }

    #[tokio::test]
    async fn test_failure_during_half_open_reopens() {
        let circuit = CircuitBreaker::new("test", quick_config());

        for _ in 0..3 {
            let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        }
        sleep(Duration::from_millis(60)).await;

        // The trial call itself fails; straight back to open
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        // And the reopened circuit rejects again
        let result = circuit.call(|| async { Ok::<_, String>("nope") }).await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_manual_reset_forces_closed() {
        let circuit = CircuitBreaker::new("test", quick_config());

        for _ in 0..3 {
            let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        }
        assert_eq!(circuit.state(), CircuitState::Open);

        circuit.reset();

        let status = circuit.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.consecutive_successes, 0);

        // Calls flow again without waiting out the cooldown
        let result = circuit.call(|| async { Ok::<_, String>("back") }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_state_serializes_in_wire_casing() {
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"HALF_OPEN\""
        );
        assert_eq!(
            serde_json::to_string(&CircuitState::Closed).unwrap(),
            "\"CLOSED\""
        );
    }
}
