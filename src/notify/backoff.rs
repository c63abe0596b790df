//! Redelivery schedule for failed notifications.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::config::DeliveryConfig;

/// Doubling delay from `base_ms`, capped at `max_ms`, with up to 10% added
/// jitter so a burst of failures does not retry in lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_ms: u64,
    max_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_ms: config.backoff_base_ms,
            max_ms: config.backoff_max_ms,
        }
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Delay before retrying after `failed_attempts` failures.
    pub fn delay(&self, failed_attempts: u32) -> Duration {
        let Some(doublings) = failed_attempts.checked_sub(1) else {
            return Duration::zero();
        };

        let ceiling = self
            .base_ms
            .checked_shl(doublings)
            .filter(|shifted| shifted >> doublings == self.base_ms)
            .map_or(self.max_ms, |shifted| shifted.min(self.max_ms));

        let jitter = match ceiling / 10 {
            0 => 0,
            spread => rand::thread_rng().gen_range(0..spread),
        };

        i64::try_from(ceiling.saturating_add(jitter))
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }

    /// When the next attempt is due, or `None` if the schedule would run
    /// past the representable calendar.
    pub fn next_attempt_at(&self, now: DateTime<Utc>, failed_attempts: u32) -> Option<DateTime<Utc>> {
        now.checked_add_signed(self.delay(failed_attempts))
    }
}
