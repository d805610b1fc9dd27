//! Capped exponential back-off for same-credential retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default first delay, in seconds.
pub const DEFAULT_BASE_SECS: f64 = 2.0;

/// Default ceiling, in seconds.
pub const DEFAULT_MAX_SECS: f64 = 60.0;

/// `delay(n) = min(base * 2^n, max)`.
///
/// `n` is zero-based and counts retries on the *same* credential. Only
/// capacity failures are retried, so this is never consulted for quota or
/// auth failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in seconds.
    pub base_secs: f64,
    /// Upper bound on any single delay, in seconds.
    pub max_secs: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_secs: DEFAULT_BASE_SECS,
            max_secs: DEFAULT_MAX_SECS,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with an explicit base and ceiling.
    pub fn new(base_secs: f64, max_secs: f64) -> Self {
        Self {
            base_secs,
            max_secs,
        }
    }

    /// Delay in seconds before retry number `attempt`.
    pub fn delay_secs(&self, attempt: u32) -> f64 {
        // 2^63 already dwarfs any sane ceiling.
        let exponent = attempt.min(63) as i32;
        (self.base_secs * 2f64.powi(exponent)).min(self.max_secs)
    }

    /// Delay before retry number `attempt` as a [`Duration`].
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.delay_secs(attempt).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_from_two_seconds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_secs(0), 2.0);
        assert_eq!(policy.delay_secs(1), 4.0);
        assert_eq!(policy.delay_secs(2), 8.0);
        assert_eq!(policy.delay_secs(3), 16.0);
    }

    #[test]
    fn delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_secs(5), 60.0);
        assert_eq!(policy.delay_secs(10), 60.0);
        assert_eq!(policy.delay_secs(u32::MAX), 60.0);
    }

    #[test]
    fn duration_matches_seconds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(4));
    }

    #[test]
    fn custom_policy() {
        let policy = BackoffPolicy::new(0.5, 3.0);
        assert_eq!(policy.delay_secs(0), 0.5);
        assert_eq!(policy.delay_secs(2), 2.0);
        assert_eq!(policy.delay_secs(3), 3.0);
    }
}
