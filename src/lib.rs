//! Failure isolation primitives for the Pledger backend.
//!
//! Pledger calls flaky upstream dependencies, most notably the LLM API used
//! for project risk scoring. This crate provides the guard rails around those
//! calls:
//!
//! - Circuit breaker pattern with per-dependency state machines and statistics
//! - A registry for operating many independent named breakers
//! - Exponential backoff for callers that compose retries around breaker calls
//!
//! The breaker never retries on its own; retry loops belong to the caller.

pub mod backoff;
pub mod circuit_breaker;

// Re-export commonly used types
pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitBreakerSnapshot, CircuitBreakerStats, CircuitState, InvalidConfigurationError,
    RegistryError, RegistrySnapshot, StateChange,
};
