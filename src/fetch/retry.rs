//! Per-source retry with exponential backoff.

use std::time::Duration;

/// Retry policy for one remote source. Each source gets its own bounded
/// retry budget before the fetcher falls back to the next source.
#[derive(Debug, Clone)]
pub struct FetchRetry {
    /// Maximum number of attempts per source (default: 3).
    pub max_attempts: usize,
    /// Base delay for exponential backoff (default: 500 ms).
    pub base_delay: Duration,
    /// Delay cap (default: 5 s).
    pub max_delay: Duration,
}

impl Default for FetchRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl FetchRetry {
    /// A policy that gives each source a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Backoff before attempt number `attempt` (zero-based). The first
    /// attempt has no delay; later ones double the base, capped.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(10) as u32;
        let delay = self.base_delay.saturating_mul(1 << exp);
        delay.min(self.max_delay)
    }
}
