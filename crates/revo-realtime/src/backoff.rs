//! Reconnect delay calculation.

use std::time::Duration;

/// Exponential backoff: attempt `n` (1-based) waits
/// `base_delay * factor^(n-1)`, never more than `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Multiplier applied per attempt (>= 1.0).
    pub factor: f64,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// Create a backoff policy.
    pub fn new(base_delay: Duration, factor: f64, max_delay: Duration) -> Self {
        Self {
            base_delay,
            factor,
            max_delay,
        }
    }

    /// Delay before reconnect attempt `attempt`. Attempt 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let exp_ms = base_ms * self.factor.max(1.0).powi(exponent);
        let capped = exp_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }
}
