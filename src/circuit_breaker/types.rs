//! Circuit breaker types, configuration, and statistics

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of state transitions retained per breaker.
pub(crate) const STATE_CHANGE_CAPACITY: usize = 50;

/// Number of recent transitions exposed in snapshots.
pub(crate) const SNAPSHOT_STATE_CHANGES: usize = 10;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, operations proceed normally
    Closed,
    /// Circuit is open, operations are rejected without executing
    Open,
    /// Circuit is half-open, probe operations test recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures in closed state before opening the circuit
    pub failure_threshold: u32,
    /// Number of successes needed in half-open state to close
    pub success_threshold: u32,
    /// Time the circuit stays open before allowing a recovery probe
    #[serde(with = "humantime_serde")]
    pub timeout_duration: Duration,
    /// Maximum wall-clock time allowed for a single wrapped call
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout_duration: Duration::from_secs(30),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Check that every threshold and duration is strictly positive.
    ///
    /// Called once at breaker construction; a config that passes here never
    /// fails later.
    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        if self.failure_threshold == 0 {
            return Err(InvalidConfigurationError::FailureThreshold);
        }
        if self.success_threshold == 0 {
            return Err(InvalidConfigurationError::SuccessThreshold);
        }
        if self.timeout_duration.is_zero() {
            return Err(InvalidConfigurationError::TimeoutDuration);
        }
        if self.call_timeout.is_zero() {
            return Err(InvalidConfigurationError::CallTimeout);
        }
        Ok(())
    }

    /// Create a config for aggressive circuit breaking
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            timeout_duration: Duration::from_secs(15),
            call_timeout: Duration::from_secs(10),
        }
    }

    /// Create a config for lenient circuit breaking
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 5,
            timeout_duration: Duration::from_secs(60),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// One recorded state transition
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    pub timestamp: DateTime<Utc>,
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: String,
}

/// Lifetime statistics for a circuit breaker
///
/// Owned exclusively by one breaker and mutated only under its lock. The
/// counters are monotone; a manual reset clears the state machine's working
/// variables but never these totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitBreakerStats {
    /// Calls that actually executed (successes plus failures)
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Calls that exceeded the call timeout (also counted in `failed_calls`)
    pub timeouts: u64,
    /// Transitions into the open state
    pub circuit_opens: u64,
    /// Calls rejected while open, never executed (not in `total_calls`)
    pub rejected_calls: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) state_changes: VecDeque<StateChange>,
}

impl CircuitBreakerStats {
    /// Append a transition record, evicting the oldest once at capacity.
    pub(crate) fn record_transition(&mut self, from: CircuitState, to: CircuitState, reason: &str) {
        if self.state_changes.len() == STATE_CHANGE_CAPACITY {
            self.state_changes.pop_front();
        }
        self.state_changes.push_back(StateChange {
            timestamp: Utc::now(),
            from,
            to,
            reason: reason.to_string(),
        });
    }

    /// The most recent transitions, oldest first.
    pub fn recent_state_changes(&self) -> Vec<StateChange> {
        let skip = self.state_changes.len().saturating_sub(SNAPSHOT_STATE_CHANGES);
        self.state_changes.iter().skip(skip).cloned().collect()
    }

    /// Number of retained transition records.
    pub fn state_change_count(&self) -> usize {
        self.state_changes.len()
    }

    /// Calculate failure rate as a percentage of executed calls
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.failed_calls as f64 / self.total_calls as f64) * 100.0
        }
    }
}

/// Read-only view of one breaker, rendered by observability endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Working failure counter of the state machine
    pub failure_count: u32,
    /// Working success counter of the half-open probe window
    pub success_count: u32,
    pub config: CircuitBreakerConfig,
    pub stats: CircuitBreakerStats,
    /// Last few transitions (the breaker retains more internally)
    pub recent_state_changes: Vec<StateChange>,
}

/// Point-in-time view of every breaker in a registry
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub generated_at: DateTime<Utc>,
    pub breakers: HashMap<String, CircuitBreakerSnapshot>,
}

/// Error from a circuit breaker protected call
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// Call rejected without executing, the circuit is open
    #[error("circuit breaker '{name}' is open, retry in {retry_in:?}")]
    Open { name: String, retry_in: Duration },
    /// Wrapped operation exceeded the call timeout
    #[error("circuit breaker '{name}' call timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
    /// Wrapped operation failed with its own error, propagated unchanged
    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    /// True if the call was rejected because the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Recover the wrapped operation error, if this is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejected configuration value, reported at construction time only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidConfigurationError {
    #[error("failure_threshold must be greater than zero")]
    FailureThreshold,
    #[error("success_threshold must be greater than zero")]
    SuccessThreshold,
    #[error("timeout_duration must be greater than zero")]
    TimeoutDuration,
    #[error("call_timeout must be greater than zero")]
    CallTimeout,
}

/// Error from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("circuit breaker '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error(transparent)]
    InvalidConfiguration(#[from] InvalidConfigurationError),
}
