//! Exponential backoff for collaborator retries.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            initial,
            max,
            factor,
            jitter: 0.1,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (1-based), capped at `max` before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.initial.as_millis() as f64 * self.factor.powi(exponent);
        let capped_ms = base_ms.min(self.max.as_millis() as f64);

        if self.jitter <= 0.0 {
            return Duration::from_millis(capped_ms as u64);
        }
        // Symmetric jitter in [-jitter, +jitter] of the capped delay.
        let spread = capped_ms * self.jitter;
        let offset = rand::random::<f64>() * spread * 2.0 - spread;
        Duration::from_millis((capped_ms + offset).max(0.0) as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(20), 2.0)
    }
}
