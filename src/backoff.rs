//! Exponential backoff for retry loops around circuit breaker calls
//!
//! The breaker itself never retries; callers compose retries externally and
//! use this calculator for the delay between attempts.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for backoff behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound on the computed delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Randomize delays to avoid synchronized retry storms
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Exponential backoff calculator
///
/// Pure function via [`ExponentialBackoff::delay_for_attempt`], or a
/// per-retry-loop session via [`ExponentialBackoff::next_delay`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with default config
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Create a new exponential backoff with custom config
    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay for a given attempt index (0-based)
    ///
    /// `min(initial_delay * multiplier^attempt, max_delay)`, scaled by a
    /// uniform factor in `[0.5, 1.0]` when jitter is enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base =
            self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_delay.as_secs_f64());

        let scaled = if self.config.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };

        Duration::from_secs_f64(scaled)
    }

    /// Delay for the current attempt, advancing the internal counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for_attempt(self.attempt);
        self.attempt += 1;
        delay
    }

    /// Zero the internal attempt counter
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}
