//! Shared value types for the invocation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values with invariants (secrets never print, reset estimates are finite
//! hours) and participate in the engine's computations.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{CredentialName, InvocationId, ModelId};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Upper bound applied to cooldowns so timestamp arithmetic cannot overflow.
const MAX_COOLDOWN_HOURS: f64 = 24.0 * 366.0;

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Serializes as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp shifted by `hours` (fractional).
    ///
    /// Negative or non-finite inputs are treated as zero; very large inputs
    /// are clamped to roughly one year.
    pub fn plus_hours(self, hours: f64) -> Self {
        let hours = if hours.is_finite() {
            hours.clamp(0.0, MAX_COOLDOWN_HOURS)
        } else {
            0.0
        };
        let millis = (hours * 3_600_000.0).round() as i64;
        match TimeDelta::try_milliseconds(millis).and_then(|d| self.0.checked_add_signed(d)) {
            Some(dt) => Self(dt),
            None => self,
        }
    }

    /// Returns the fractional hours from `earlier` to `self`.
    ///
    /// Negative when `earlier` is actually later.
    pub fn hours_since(self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0).num_milliseconds() as f64 / 3_600_000.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A secret API key.
///
/// `Debug` and `Display` are redacted; the only way to read the secret is
/// [`ApiKey::expose`], which the transport calls when building a request.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a raw key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replaces every occurrence of this key in `text` with `[REDACTED]`.
    pub fn redact_from(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, "[REDACTED]")
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Authentication scheme of a [`Credential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// A static API key sent with every request.
    #[default]
    ApiKey,
}

/// One named credential from the pool.
///
/// Identity is [`Credential::name`]. Pool order is significant and is fixed
/// when the credentials file is loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Credential {
    /// Unique name; the only attribute ever surfaced outside the process.
    pub name: CredentialName,

    /// The secret.
    pub key: ApiKey,

    /// Authentication scheme.
    #[serde(rename = "type", default)]
    pub credential_type: CredentialType,

    /// Disabled credentials stay in the pool but are never selected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Call outcomes
// ---------------------------------------------------------------------------

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The credential's usage allotment is used up until a reset time.
    QuotaExhausted,
    /// The backend is transiently overloaded.
    CapacityExhausted,
    /// The credential was rejected; it will not recover on its own.
    AuthError,
    /// Anything the classifier does not recognise.
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::QuotaExhausted => "quota_exhausted",
            ErrorKind::CapacityExhausted => "capacity_exhausted",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// The outcome of one `invoke()` call.
///
/// Produced once at the end of the call and never mutated afterwards. Every
/// field is forwarded verbatim into the caller's audit log, so nothing here
/// may contain secret material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    /// Correlates this result with the client's tracing events.
    pub invocation_id: InvocationId,

    /// `true` when the backend produced a response.
    pub success: bool,

    /// Extracted response text on success.
    pub response: Option<String>,

    /// Raw response body on success.
    pub raw_response: Option<String>,

    /// Classification of the last failure seen.
    pub error_kind: Option<ErrorKind>,

    /// Text of the last failure seen, with the credential key scrubbed.
    pub error_message: Option<String>,

    /// The canonical model the caller asked for.
    pub model_requested: ModelId,

    /// The model the backend reports having served, on success.
    ///
    /// The client only logs a warning when this differs from
    /// `model_requested`; callers that must enforce tier equality check
    /// [`CallResult::model_matches_request`].
    pub model_verified: Option<String>,

    /// Wall-clock duration of the whole call, including backoff sleeps.
    pub duration_ms: u64,

    /// The last credential attempted, if any.
    pub credential_used: Option<CredentialName>,

    /// `true` iff more than one distinct credential was attempted.
    pub rotation_occurred: bool,

    /// Total transport calls made.
    pub attempts: u32,

    /// `true` when no credential in the pool is currently usable.
    pub pool_exhausted: bool,

    /// Hours until the soonest exhausted credential is expected to recover.
    ///
    /// The minimum cooldown recorded during this call; when none was recorded
    /// and the pool is exhausted, the minimum remaining window over every
    /// tracked exhausted credential in the state file. Credentials disabled
    /// by an auth failure never contribute.
    pub earliest_reset_hours: Option<f64>,
}

impl CallResult {
    /// Serializes the result for the upstream audit log.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether the served model is the requested one or a dated variant of
    /// it (`gemini-2.5-pro-preview-06-05` for `gemini-2.5-pro`). `None` when
    /// nothing was served.
    pub fn model_matches_request(&self) -> Option<bool> {
        self.model_verified
            .as_deref()
            .map(|served| served.starts_with(self.model_requested.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_never_prints() {
        let key = ApiKey::new("AIzaSecret123");
        assert_eq!(format!("{key}"), "[REDACTED]");
        assert!(!format!("{key:?}").contains("AIzaSecret123"));
    }

    #[test]
    fn api_key_redacts_itself_from_text() {
        let key = ApiKey::new("AIzaSecret123");
        let scrubbed = key.redact_from("bad key AIzaSecret123 rejected");
        assert_eq!(scrubbed, "bad key [REDACTED] rejected");
    }

    #[test]
    fn credential_defaults_enabled_and_api_key_type() {
        let c: Credential = serde_json::from_str(r#"{"name":"a","key":"k"}"#).unwrap();
        assert!(c.enabled);
        assert_eq!(c.credential_type, CredentialType::ApiKey);
    }

    #[test]
    fn plus_hours_round_trips_through_hours_since() {
        let start = Timestamp::now();
        let later = start.plus_hours(1.5);
        assert!((later.hours_since(start) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn plus_hours_ignores_negative_and_nan() {
        let start = Timestamp::now();
        assert_eq!(start.plus_hours(-3.0), start);
        assert_eq!(start.plus_hours(f64::NAN), start);
    }

    #[test]
    fn timestamp_serializes_as_rfc3339_string() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
        assert!(json.starts_with('"'));
    }

    #[test]
    fn error_kind_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&ErrorKind::QuotaExhausted).unwrap();
        assert_eq!(json, "\"quota_exhausted\"");
        assert_eq!(ErrorKind::AuthError.to_string(), "auth_error");
    }

    fn served(model: Option<&str>) -> CallResult {
        CallResult {
            invocation_id: crate::InvocationId::new(),
            success: model.is_some(),
            response: None,
            raw_response: None,
            error_kind: None,
            error_message: None,
            model_requested: crate::ModelId::new("gemini-2.5-pro").unwrap(),
            model_verified: model.map(str::to_string),
            duration_ms: 0,
            credential_used: None,
            rotation_occurred: false,
            attempts: 1,
            pool_exhausted: false,
            earliest_reset_hours: None,
        }
    }

    #[test]
    fn model_match_accepts_dated_variants_only() {
        assert_eq!(served(Some("gemini-2.5-pro")).model_matches_request(), Some(true));
        assert_eq!(
            served(Some("gemini-2.5-pro-preview-06-05")).model_matches_request(),
            Some(true)
        );
        assert_eq!(served(Some("gemini-2.5-flash")).model_matches_request(), Some(false));
        assert_eq!(served(None).model_matches_request(), None);
    }
}
