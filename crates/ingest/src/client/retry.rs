//! Retry policy for the request client.

use std::time::Duration;

use rand::RngExt;
use serde::{Deserialize, Serialize};

/// Ceiling and delays shared by the three retry tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per operation, first attempt included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay of the rate-limit backoff in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt to the rate-limit backoff.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Cap on the exponential part of the rate-limit backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound (exclusive) of the random jitter added to every delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Fixed delay before retrying a transport failure.
    #[serde(default = "default_transport_delay_ms")]
    pub transport_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    3000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ms() -> u64 {
    2000
}

fn default_transport_delay_ms() -> u64 {
    3000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            transport_delay_ms: default_transport_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy with the given ceiling and no waiting at all.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            backoff_factor: 1.0,
            max_delay_ms: 0,
            jitter_ms: 0,
            transport_delay_ms: 0,
        }
    }

    /// Effective ceiling; a policy always allows at least one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// `base × factor^attempt`, capped at `max_delay`, plus jitter.
    /// `attempt` is 0-indexed.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = if exp.is_finite() {
            exp.min(self.max_delay_ms as f64) as u64
        } else {
            self.max_delay_ms
        };
        Duration::from_millis(capped) + self.jitter()
    }

    /// Fixed transport-failure delay plus jitter.
    pub fn transport_delay(&self) -> Duration {
        Duration::from_millis(self.transport_delay_ms) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..self.jitter_ms))
    }
}
