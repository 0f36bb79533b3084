//! Circuit breaker registry for managing multiple circuit breakers

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::breaker::CircuitBreaker;
use super::types::{
    CircuitBreakerConfig, InvalidConfigurationError, RegistryError, RegistrySnapshot,
};

/// Named collection of circuit breakers, one per guarded dependency
///
/// Construct one at application startup and hand references to the
/// subsystems that need breakers; there is no hidden global instance.
/// Breakers never share a lock, so two dependencies never block each other.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create a new registry with default config
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            default_config: CircuitBreakerConfig::default(),
        }
    }

    /// Create a registry whose get-or-create path uses the given config
    pub fn with_default_config(
        config: CircuitBreakerConfig,
    ) -> Result<Self, InvalidConfigurationError> {
        config.validate()?;
        Ok(Self {
            breakers: DashMap::new(),
            default_config: config,
        })
    }

    /// Register an externally constructed breaker
    ///
    /// Duplicate names fail; an existing breaker is never silently replaced.
    pub fn register(&self, breaker: CircuitBreaker) -> Result<Arc<CircuitBreaker>, RegistryError> {
        let name = breaker.name().to_string();
        match self.breakers.entry(name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(name)),
            Entry::Vacant(slot) => {
                let breaker = Arc::new(breaker);
                slot.insert(Arc::clone(&breaker));
                Ok(breaker)
            }
        }
    }

    /// Build and register a breaker with the given config
    pub fn create_breaker(
        &self,
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, RegistryError> {
        let breaker = CircuitBreaker::with_config(name, config)?;
        self.register(breaker)
    }

    /// Look up a breaker by name; never constructs one
    pub fn get_breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Get or lazily create a breaker using the registry's default config
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::build(
                    name.to_string(),
                    self.default_config.clone(),
                ))
            })
            .clone()
    }

    /// Get all circuit breaker names
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Remove a breaker, releasing the registry's ownership of it
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.remove(name).map(|(_, breaker)| breaker)
    }

    /// Snapshot every breaker for observability endpoints
    ///
    /// Read-only; never mutates a breaker. Handles are collected up front so
    /// no map shard lock is held across an await.
    pub async fn all_stats(&self) -> RegistrySnapshot {
        let handles: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| Arc::clone(e.value())).collect();

        let mut breakers = HashMap::with_capacity(handles.len());
        for breaker in handles {
            breakers.insert(breaker.name().to_string(), breaker.snapshot().await);
        }

        RegistrySnapshot {
            generated_at: Utc::now(),
            breakers,
        }
    }

    /// Reset all circuit breakers
    ///
    /// Resets are independent per breaker; the order is not significant.
    pub async fn reset_all(&self) {
        let handles: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| Arc::clone(e.value())).collect();
        for breaker in handles {
            breaker.reset().await;
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
