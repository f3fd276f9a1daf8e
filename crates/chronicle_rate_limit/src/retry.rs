//! Retry policy for generation calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff.
///
/// The wait after failed attempt `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. With `max_attempts = 3` a unit is tried three times and waits twice.
///
/// ```toml
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 1000
/// max_delay_ms = 30000
/// jitter = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per unit, including the first
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Randomize each delay
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt bound and base delay, no jitter.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let millis = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// The delays between attempts, one fewer than `max_attempts`.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts.max(1))
            .map(|attempt| self.delay_for(attempt))
            .map(|delay| {
                if self.jitter {
                    tokio_retry2::strategy::jitter(delay)
                } else {
                    delay
                }
            })
            .collect()
    }
}
