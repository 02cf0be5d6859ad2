//! Exponential reconnect backoff with a ceiling.

use std::time::Duration;

use rand::Rng;

/// Delay policy between failed reconnect attempts.
///
/// The delay for attempt `n` (zero-based) is `base * factor^n`, clamped to
/// `max`. The arithmetic saturates, so a long outage settles on `max`
/// instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: u32,
    pub max: Duration,
    /// Add up to a quarter of the delay as random jitter.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            factor: 2,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl Backoff {
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the next attempt after `retries` consecutive failures.
    pub fn delay(&self, retries: u32) -> Duration {
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let multiplier = u64::from(self.factor.max(1)).saturating_pow(retries);
        let mut delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);
        if self.jitter && delay_ms >= 4 {
            delay_ms = delay_ms
                .saturating_add(rand::thread_rng().gen_range(0..=delay_ms / 4))
                .min(max_ms);
        }
        Duration::from_millis(delay_ms)
    }
}
