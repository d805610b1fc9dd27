//! Turns a classified failure into a [`Recovery`] decision.

use serde::{Deserialize, Serialize};

use crate::{parse_reset_hours, BackoffPolicy, ErrorKind, Recovery};

/// Calls allowed on one credential within one `invoke()` before a capacity
/// failure forces rotation.
pub const DEFAULT_MAX_RETRIES_PER_CREDENTIAL: u32 = 5;

/// Cooldown applied to a quota-exhausted credential whose error carries no
/// reset hint.
pub const DEFAULT_QUOTA_COOLDOWN_HOURS: f64 = 24.0;

/// Cooldown applied to a credential that stayed overloaded through every
/// same-credential retry.
pub const DEFAULT_CAPACITY_COOLDOWN_HOURS: f64 = 0.25;

/// Tunables for the engine's failure handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRules {
    /// Total calls permitted on one credential for capacity failures.
    pub max_retries_per_credential: u32,
    /// Delay schedule between those calls.
    pub backoff: BackoffPolicy,
    /// Fallback cooldown for quota failures without a reset hint.
    pub quota_cooldown_hours: f64,
    /// Cooldown after the capacity retries are used up.
    pub capacity_cooldown_hours: f64,
}

impl Default for RecoveryRules {
    fn default() -> Self {
        Self {
            max_retries_per_credential: DEFAULT_MAX_RETRIES_PER_CREDENTIAL,
            backoff: BackoffPolicy::default(),
            quota_cooldown_hours: DEFAULT_QUOTA_COOLDOWN_HOURS,
            capacity_cooldown_hours: DEFAULT_CAPACITY_COOLDOWN_HOURS,
        }
    }
}

impl RecoveryRules {
    /// Sets the per-credential call limit. Values below 1 are raised to 1.
    pub fn with_max_retries_per_credential(mut self, max: u32) -> Self {
        self.max_retries_per_credential = max.max(1);
        self
    }

    /// Sets the back-off schedule.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the quota fallback cooldown.
    pub fn with_quota_cooldown_hours(mut self, hours: f64) -> Self {
        self.quota_cooldown_hours = hours;
        self
    }

    /// Sets the capacity cooldown.
    pub fn with_capacity_cooldown_hours(mut self, hours: f64) -> Self {
        self.capacity_cooldown_hours = hours;
        self
    }

    /// Decides what to do after a failure of `kind`.
    ///
    /// `raw` is the (already redacted) error text, consulted for a reset hint.
    /// `attempts_on_credential` is the zero-based count of retries already
    /// made on the current credential.
    pub fn decide(&self, kind: ErrorKind, raw: &str, attempts_on_credential: u32) -> Recovery {
        match kind {
            ErrorKind::AuthError => Recovery::Disable,
            ErrorKind::QuotaExhausted => Recovery::Rotate {
                cooldown_hours: parse_reset_hours(raw).unwrap_or(self.quota_cooldown_hours),
            },
            ErrorKind::CapacityExhausted => {
                if attempts_on_credential.saturating_add(1) < self.max_retries_per_credential {
                    Recovery::RetrySameCredential {
                        after: self.backoff.delay(attempts_on_credential),
                    }
                } else {
                    Recovery::Rotate {
                        cooldown_hours: self.capacity_cooldown_hours,
                    }
                }
            }
            ErrorKind::Unknown => Recovery::RotateWithoutCooldown,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn auth_disables() {
        let rules = RecoveryRules::default();
        assert_eq!(rules.decide(ErrorKind::AuthError, "401", 0), Recovery::Disable);
    }

    #[test]
    fn quota_uses_reset_hint_when_present() {
        let rules = RecoveryRules::default();
        let decision = rules.decide(ErrorKind::QuotaExhausted, "reset after 2h", 0);
        assert_eq!(decision, Recovery::Rotate { cooldown_hours: 2.0 });
    }

    #[test]
    fn quota_falls_back_to_long_default() {
        let rules = RecoveryRules::default();
        let decision = rules.decide(ErrorKind::QuotaExhausted, "429", 0);
        assert_eq!(
            decision,
            Recovery::Rotate {
                cooldown_hours: DEFAULT_QUOTA_COOLDOWN_HOURS
            }
        );
    }

    #[test]
    fn capacity_retries_until_the_last_allowed_call() {
        let rules = RecoveryRules::default().with_max_retries_per_credential(3);
        assert_eq!(
            rules.decide(ErrorKind::CapacityExhausted, "503", 0),
            Recovery::RetrySameCredential {
                after: Duration::from_secs(2)
            }
        );
        assert_eq!(
            rules.decide(ErrorKind::CapacityExhausted, "503", 1),
            Recovery::RetrySameCredential {
                after: Duration::from_secs(4)
            }
        );
        assert_eq!(
            rules.decide(ErrorKind::CapacityExhausted, "503", 2),
            Recovery::Rotate {
                cooldown_hours: DEFAULT_CAPACITY_COOLDOWN_HOURS
            }
        );
    }

    #[test]
    fn single_call_limit_never_retries() {
        let rules = RecoveryRules::default().with_max_retries_per_credential(0);
        assert_eq!(rules.max_retries_per_credential, 1);
        assert!(rules.decide(ErrorKind::CapacityExhausted, "503", 0).rotates());
    }

    #[test]
    fn unknown_rotates_without_cooldown() {
        let rules = RecoveryRules::default();
        assert_eq!(
            rules.decide(ErrorKind::Unknown, "weird", 0),
            Recovery::RotateWithoutCooldown
        );
    }
}
