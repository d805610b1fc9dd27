//! Maps the raw text of a failed call onto an [`ErrorKind`].
//!
//! Matching is a case-insensitive substring search against fixed token sets,
//! checked in a fixed priority order: auth, then quota, then capacity. The
//! first set that matches wins, so a message carrying both a `401` and a
//! `429` is an auth failure.

use crate::ErrorKind;

/// Tokens indicating the credential itself was rejected.
const AUTH_TOKENS: &[&str] = &[
    "api key invalid",
    "api_key_invalid",
    "api key not valid",
    "invalid api key",
    "401",
    "403",
    "permission denied",
    "permission_denied",
    "unauthenticated",
];

/// Tokens indicating the credential's quota is used up.
const QUOTA_TOKENS: &[&str] = &[
    "terminal quota error",
    "429",
    "too many requests",
    "exceeded your current quota",
    "quota will reset",
];

/// Tokens indicating transient backend overload.
const CAPACITY_TOKENS: &[&str] = &[
    "capacity exhausted",
    "no capacity available",
    "503",
    "overloaded",
    "service unavailable",
];

/// Classifies a raw error message.
pub fn classify(raw: &str) -> ErrorKind {
    let lower = raw.to_lowercase();

    if contains_any(&lower, AUTH_TOKENS) {
        return ErrorKind::AuthError;
    }

    if contains_any(&lower, QUOTA_TOKENS) || is_personal_capacity_exhaustion(&lower) {
        return ErrorKind::QuotaExhausted;
    }

    if contains_any(&lower, CAPACITY_TOKENS) {
        return ErrorKind::CapacityExhausted;
    }

    ErrorKind::Unknown
}

fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| haystack.contains(t))
}

/// "You have exhausted your capacity on this model" is a per-account quota,
/// unlike a bare "capacity exhausted" which is service-wide overload.
fn is_personal_capacity_exhaustion(lower: &str) -> bool {
    lower.contains("exhausted") && lower.contains("your capacity")
}
