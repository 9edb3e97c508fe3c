use std::time::Duration;

use crate::config::RetryConfig;

/// Per-step retry policy: linear backoff plus confidence decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub confidence_decay: f64,
}

impl RetryPolicy {
    /// Wait before the `retry_count`-th retry (1-based)
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(retry_count)
    }

    /// Confidence after one more failed attempt; never increases and stays
    /// in [0, 1] for any input
    pub fn decay(&self, confidence: f64) -> f64 {
        if confidence.is_nan() {
            return 0.0;
        }
        let ceiling = confidence.clamp(0.0, 1.0);
        (ceiling * self.confidence_decay).max(0.0).min(ceiling)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            confidence_decay: config.confidence_decay,
        }
    }
}
