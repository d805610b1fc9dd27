//! Model governance: the requested model tier is never silently downgraded.
//!
//! A [`ModelPolicy`] is consulted exactly once, when a client is constructed.
//! It accepts ids from one provider family and rejects an explicit deny set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ConfigurationError, ModelId};

/// Provider family prefix accepted by [`ModelPolicy::default`].
pub const GEMINI_FAMILY_PREFIX: &str = "gemini-";

/// Lower-tier models the default policy refuses to serve.
pub const DEFAULT_FORBIDDEN_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
];

/// Allow pattern plus deny set for model identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPolicy {
    /// Family prefix every accepted id must start with (e.g. `gemini-`).
    pub allowed_prefix: String,

    /// Canonical ids that are refused even though they match the prefix.
    #[serde(default)]
    pub forbidden: BTreeSet<String>,
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self::new(GEMINI_FAMILY_PREFIX, DEFAULT_FORBIDDEN_MODELS.iter().copied())
    }
}

impl ModelPolicy {
    /// Creates a policy from a family prefix and a deny list.
    ///
    /// Entries are canonicalised the same way requested ids are.
    pub fn new<I, S>(allowed_prefix: impl Into<String>, forbidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_prefix: allowed_prefix.into().trim().to_ascii_lowercase(),
            forbidden: forbidden
                .into_iter()
                .map(|m| canonicalize(m.as_ref()))
                .collect(),
        }
    }

    /// Parses a policy table from JSON.
    ///
    /// Deny-list entries are canonicalised after parsing.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: ModelPolicy = serde_json::from_str(json)?;
        Ok(Self::new(raw.allowed_prefix, raw.forbidden))
    }

    /// Validates `requested` and returns its canonical form.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::InvalidModel`] if the id is not in the family.
    /// - [`ConfigurationError::ForbiddenModel`] if the id is in the deny set.
    pub fn validate(&self, requested: &str) -> Result<ModelId, ConfigurationError> {
        let canonical = canonicalize(requested);

        if !self.matches_family(&canonical) {
            return Err(ConfigurationError::InvalidModel {
                model: requested.to_string(),
                expected_prefix: self.allowed_prefix.clone(),
            });
        }

        if self.forbidden.contains(&canonical) {
            return Err(ConfigurationError::ForbiddenModel { model: canonical });
        }

        tracing::debug!(model = %canonical, "Model accepted by policy");

        ModelId::new(canonical.clone()).ok_or(ConfigurationError::InvalidModel {
            model: canonical,
            expected_prefix: self.allowed_prefix.clone(),
        })
    }

    fn matches_family(&self, canonical: &str) -> bool {
        let Some(rest) = canonical.strip_prefix(self.allowed_prefix.as_str()) else {
            return false;
        };
        !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    }
}

/// Trims, lowercases and strips the REST resource prefix `models/`.
fn canonicalize(model: &str) -> String {
    let lowered = model.trim().to_ascii_lowercase();
    match lowered.strip_prefix("models/") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_family_members_outside_the_deny_set() {
        let policy = ModelPolicy::default();
        for model in ["gemini-2.5-pro", "gemini-3-pro-preview", "gemini-1.5-pro-002"] {
            let id = policy.validate(model).unwrap();
            assert_eq!(id.as_str(), model);
        }
    }

    #[test]
    fn canonicalises_case_whitespace_and_resource_prefix() {
        let policy = ModelPolicy::default();
        let id = policy.validate("  models/Gemini-2.5-Pro ").unwrap();
        assert_eq!(id.as_str(), "gemini-2.5-pro");
    }

    #[test]
    fn every_forbidden_id_is_rejected_with_forbidden_message() {
        let policy = ModelPolicy::default();
        for model in DEFAULT_FORBIDDEN_MODELS {
            let err = policy.validate(model).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::ForbiddenModel { .. }),
                "{model}: {err}"
            );
            assert!(err.to_string().contains("forbidden"));
        }
    }

    #[test]
    fn other_provider_models_are_invalid() {
        let policy = ModelPolicy::default();
        for model in ["claude-sonnet-4", "gpt-4o", "gemini-", "gemini-2.5 pro", ""] {
            let err = policy.validate(model).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidModel { .. }),
                "{model}: {err}"
            );
            assert!(err.to_string().contains("not a valid model"));
        }
    }

    #[test]
    fn policies_are_independent_values() {
        let strict = ModelPolicy::new("gemini-", ["gemini-2.5-pro"]);
        let lenient = ModelPolicy::new("gemini-", Vec::<String>::new());
        assert!(strict.validate("gemini-2.5-pro").is_err());
        assert!(lenient.validate("gemini-2.5-pro").is_ok());
    }

    #[test]
    fn policy_table_loads_from_json() {
        let policy = ModelPolicy::from_json(
            r#"{"allowed_prefix":"gemini-","forbidden":["Gemini-2.5-Flash"]}"#,
        )
        .unwrap();
        assert!(policy.forbidden.contains("gemini-2.5-flash"));
        assert!(policy.validate("gemini-2.5-flash").is_err());
    }
}
