//! Circuit breaker implementation

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;

use super::types::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot, CircuitBreakerStats,
    CircuitState, InvalidConfigurationError,
};

/// Working variables of the state machine, guarded by a single lock.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Earliest time a recovery probe is allowed; set only while open
    next_attempt_at: Option<Instant>,
    stats: CircuitBreakerStats,
}

/// Circuit breaker for protecting against failing dependencies
///
/// All state inspection and mutation happens under one async lock per
/// breaker, so transitions are totally ordered. The lock is taken twice per
/// call (admission, then outcome recording) and is never held while the
/// wrapped operation runs, so a slow call cannot serialize other callers.
pub struct CircuitBreaker {
    /// Dependency name (for logging, metrics, and registry lookup)
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom config
    ///
    /// Fails if any threshold or duration is not strictly positive.
    pub fn with_config(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Self, InvalidConfigurationError> {
        config.validate()?;
        Ok(Self::build(name.into(), config))
    }

    /// Construct from an already validated config.
    pub(crate) fn build(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_attempt_at: None,
                stats: CircuitBreakerStats::default(),
            }),
        }
    }

    /// Get the dependency name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state
    ///
    /// Read-only: the open-to-half-open transition happens on the next call
    /// attempt, never from a state inspection.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Every operation error counts toward the failure threshold. The
    /// operation is invoked at most once; retry loops belong to the caller.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Like [`CircuitBreaker::call`], but only errors matching the classifier
    /// advance the state machine
    ///
    /// Errors the classifier excludes (e.g. a permanent client-side error
    /// that says nothing about the dependency's health) still propagate to
    /// the caller and are counted in `failed_calls`, but do not move the
    /// circuit toward opening.
    pub async fn call_classified<T, E, F, Fut, C>(
        &self,
        operation: F,
        is_circuit_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        // Admission decision; the lock is dropped before the operation runs.
        {
            let mut inner = self.inner.lock().await;
            if inner.state == CircuitState::Open {
                let now = Instant::now();
                match inner.next_attempt_at {
                    Some(at) if now < at => {
                        inner.stats.rejected_calls += 1;
                        return Err(CircuitBreakerError::Open {
                            name: self.name.clone(),
                            retry_in: at - now,
                        });
                    }
                    _ => {
                        self.transition(
                            &mut inner,
                            CircuitState::HalfOpen,
                            "Timeout expired, testing service",
                        );
                    }
                }
            }
        }

        // The timeout abandons the future at the call site; stopping the
        // underlying work is the operation's own responsibility.
        let outcome = tokio::time::timeout(self.config.call_timeout, operation()).await;

        let mut inner = self.inner.lock().await;
        match outcome {
            Ok(Ok(value)) => {
                self.on_success(&mut inner);
                Ok(value)
            }
            Ok(Err(err)) => {
                if is_circuit_failure(&err) {
                    self.on_failure(&mut inner);
                } else {
                    // Failed for the caller, not a dependency-health signal.
                    inner.stats.total_calls += 1;
                    inner.stats.failed_calls += 1;
                    inner.stats.last_failure_time = Some(Utc::now());
                }
                Err(CircuitBreakerError::Operation(err))
            }
            Err(_elapsed) => {
                inner.stats.timeouts += 1;
                self.on_failure(&mut inner);
                Err(CircuitBreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.call_timeout,
                })
            }
        }
    }

    /// Manually force the breaker back to closed
    ///
    /// Clears the state machine's working counters; lifetime stats are
    /// preserved.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        self.transition(&mut inner, CircuitState::Closed, "Manual reset");
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt_at = None;
    }

    /// Get a copy of the lifetime statistics
    pub async fn stats(&self) -> CircuitBreakerStats {
        self.inner.lock().await.stats.clone()
    }

    /// Get a full read-only snapshot for observability endpoints
    pub async fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock().await;
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            config: self.config.clone(),
            recent_state_changes: inner.stats.recent_state_changes(),
            stats: inner.stats.clone(),
        }
    }

    fn on_success(&self, inner: &mut BreakerState) {
        inner.stats.total_calls += 1;
        inner.stats.successful_calls += 1;
        inner.stats.last_success_time = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(inner, CircuitState::Closed, "Success threshold reached");
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.next_attempt_at = None;
                }
            }
            // A call admitted during half-open can finish after a concurrent
            // failure reopened the circuit; count it, leave the state alone.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, inner: &mut BreakerState) {
        inner.stats.total_calls += 1;
        inner.stats.failed_calls += 1;
        inner.stats.last_failure_time = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.open(inner, "Failure threshold exceeded");
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during the probe window reopens immediately
                self.open(inner, "Failure during half-open test");
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self, inner: &mut BreakerState, reason: &str) {
        self.transition(inner, CircuitState::Open, reason);
        inner.stats.circuit_opens += 1;
        inner.success_count = 0;
        inner.next_attempt_at = Some(Instant::now() + self.config.timeout_duration);
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState, reason: &str) {
        let from = inner.state;
        inner.state = to;
        inner.stats.record_transition(from, to, reason);

        match to {
            CircuitState::Open => {
                tracing::warn!(
                    circuit = %self.name,
                    %from,
                    %to,
                    reason,
                    "circuit breaker opened"
                );
            }
            _ => {
                tracing::info!(
                    circuit = %self.name,
                    %from,
                    %to,
                    reason,
                    "circuit breaker state changed"
                );
            }
        }
    }
}
