//! Client tunables and policy-table loading.

use std::path::Path;
use std::time::Duration;

use invocation::{ConfigurationError, ModelPolicy, RecoveryRules};

use crate::gemini::DEFAULT_GEMINI_BASE_URL;

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything about a client that is not the model, the credentials or the
/// state file.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Retry, back-off and cooldown rules.
    pub recovery: RecoveryRules,
    /// Timeout applied to each HTTP request by the Gemini transport.
    pub request_timeout: Duration,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            recovery: RecoveryRules::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Sets the retry, back-off and cooldown rules.
    pub fn with_recovery(mut self, recovery: RecoveryRules) -> Self {
        self.recovery = recovery;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Points the Gemini transport at a different endpoint.
    pub fn with_gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.gemini_base_url = url.into();
        self
    }
}

/// Reads a [`ModelPolicy`] table from a JSON file.
///
/// ```json
/// { "allowed_prefix": "gemini-", "forbidden": ["gemini-2.5-flash"] }
/// ```
pub fn load_model_policy(path: impl AsRef<Path>) -> Result<ModelPolicy, ConfigurationError> {
    let path = path.as_ref();
    let invalid = |message: String| ConfigurationError::InvalidPolicy {
        path: path.to_path_buf(),
        message,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let policy = ModelPolicy::from_json(&raw).map_err(|e| invalid(e.to_string()))?;

    if policy.allowed_prefix.is_empty() {
        return Err(invalid("allowed_prefix must not be empty".to_string()));
    }

    tracing::debug!(
        path = %path.display(),
        prefix = %policy.allowed_prefix,
        forbidden = policy.forbidden.len(),
        "Loaded model policy"
    );
    Ok(policy)
}
