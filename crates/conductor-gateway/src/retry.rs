use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry behaviour for transient tool-call failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per tool call, the first one included.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Cap on any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Relative jitter in `[0, 1]`; 0.2 spreads delays over ±20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based), jitter included.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = compute_backoff(self, attempt);
        let jittered = apply_jitter(base, self.jitter, &mut rand::thread_rng());
        Duration::from_millis(jittered.min(self.max_delay_ms))
    }
}

/// `base * 2^(attempt - 1)`, capped at `max_delay_ms`.
fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1);
    let delay = policy
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent));
    delay.min(policy.max_delay_ms)
}

fn apply_jitter(delay_ms: u64, jitter: f64, rng: &mut impl Rng) -> u64 {
    let jitter = if jitter.is_finite() {
        jitter.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if delay_ms == 0 || jitter == 0.0 {
        return delay_ms;
    }
    let factor = rng.gen_range((1.0 - jitter)..=(1.0 + jitter));
    (delay_ms as f64 * factor).round() as u64
}
