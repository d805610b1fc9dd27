//! Fatal configuration errors and the recovery decisions taken for remote
//! failures.
//!
//! [`ConfigurationError`] is the only error a client ever raises, and only at
//! construction. Remote failures are never raised; each [`ErrorKind`](crate::ErrorKind) maps to
//! a [`Recovery`] that the engine applies internally.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Recovery semantics
// ---------------------------------------------------------------------------

/// What the engine does after a classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Recovery {
    /// Retry the same credential after sleeping `after`.
    RetrySameCredential {
        /// Back-off before the next attempt.
        after: Duration,
    },
    /// Mark the credential exhausted for `cooldown_hours` and move on.
    Rotate {
        /// How long the credential stays out of rotation.
        cooldown_hours: f64,
    },
    /// Mark the credential permanently disabled and move on.
    Disable,
    /// Move on without recording anything against the credential.
    RotateWithoutCooldown,
}

impl Recovery {
    /// Returns `true` if this decision moves to the next credential.
    pub fn rotates(&self) -> bool {
        !matches!(self, Recovery::RetrySameCredential { .. })
    }
}

// ---------------------------------------------------------------------------
// Construction-time errors
// ---------------------------------------------------------------------------

/// Problems detected while constructing a client.
///
/// Never retried; surfaced synchronously before any network activity.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The model id does not match the provider family naming pattern.
    #[error("'{model}' is not a valid model for this provider (expected prefix '{expected_prefix}')")]
    InvalidModel {
        /// The model id as supplied by the caller.
        model: String,
        /// The family prefix the policy requires.
        expected_prefix: String,
    },

    /// The model id is explicitly forbidden by the policy.
    #[error("model '{model}' is forbidden: tier downgrade not permitted")]
    ForbiddenModel {
        /// The canonical model id.
        model: String,
    },

    /// The credentials file does not exist.
    #[error("credentials file not found: {}", path.display())]
    CredentialsNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The credentials file exists but could not be read.
    #[error("credentials file {} could not be read: {source}", path.display())]
    CredentialsUnreadable {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The credentials file could not be parsed or violates pool rules.
    #[error("credentials file {} is malformed: {message}", path.display())]
    MalformedCredentials {
        /// Path that was parsed.
        path: PathBuf,
        /// Description of the problem. Never contains key material.
        message: String,
    },

    /// A model policy table could not be read or parsed.
    #[error("model policy {} is invalid: {message}", path.display())]
    InvalidPolicy {
        /// Path of the policy table.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The transport could not be initialised (e.g. TLS backend failure).
    #[error("transport could not be initialised: {message}")]
    Transport {
        /// Description of the problem.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_message_mentions_forbidden() {
        let err = ConfigurationError::ForbiddenModel {
            model: "gemini-2.5-flash".into(),
        };
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn only_retry_stays_on_the_credential() {
        assert!(!Recovery::RetrySameCredential {
            after: Duration::from_secs(2)
        }
        .rotates());
        assert!(Recovery::Disable.rotates());
        assert!(Recovery::RotateWithoutCooldown.rotates());
        assert!(Recovery::Rotate { cooldown_hours: 1.0 }.rotates());
    }
}
