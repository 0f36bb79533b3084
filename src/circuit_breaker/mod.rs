//! Circuit breaker pattern for fault tolerance
//!
//! Prevents cascading failures by temporarily disabling failing operations.
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count reaches failure_threshold
//! Open → Half-Open: after timeout_duration, on the next call attempt
//! Half-Open → Closed: success_count reaches success_threshold
//! Half-Open → Open: any failure during the probe window
//! ```

mod breaker;
mod registry;
mod types;


// Re-export all public items
pub use breaker::CircuitBreaker;
pub use registry::CircuitBreakerRegistry;
pub use types::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot, CircuitBreakerStats,
    CircuitState, InvalidConfigurationError, RegistryError, RegistrySnapshot, StateChange,
};
