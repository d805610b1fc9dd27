//! Environment-driven CLI configuration.

use std::path::PathBuf;

use anyhow::{bail, Context};

pub const MODEL_VAR: &str = "KEYRELAY_MODEL";
pub const CREDENTIALS_VAR: &str = "KEYRELAY_CREDENTIALS";
pub const STATE_VAR: &str = "KEYRELAY_STATE";
pub const POLICY_VAR: &str = "KEYRELAY_POLICY";
pub const SYSTEM_INSTRUCTION_VAR: &str = "KEYRELAY_SYSTEM_INSTRUCTION";
pub const MAX_RETRIES_VAR: &str = "KEYRELAY_MAX_RETRIES";
pub const GEMINI_BASE_URL_VAR: &str = "KEYRELAY_GEMINI_BASE_URL";

/// Everything one run needs besides the prompt content.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub model: String,
    pub credentials_path: PathBuf,
    pub state_path: PathBuf,
    pub policy_path: Option<PathBuf>,
    pub system_instruction: String,
    pub max_retries_per_credential: Option<u32>,
    pub gemini_base_url: Option<String>,
}

impl CliConfig {
    /// Reads the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| get(name).with_context(|| format!("{name} must be set"));

        let max_retries_per_credential = match get(MAX_RETRIES_VAR) {
            Some(raw) => {
                let value: u32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{MAX_RETRIES_VAR} must be a positive integer, got '{raw}'"))?;
                if value == 0 {
                    bail!("{MAX_RETRIES_VAR} must be at least 1");
                }
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            model: require(MODEL_VAR)?,
            credentials_path: require(CREDENTIALS_VAR)?.into(),
            state_path: require(STATE_VAR)?.into(),
            policy_path: get(POLICY_VAR).map(PathBuf::from),
            system_instruction: get(SYSTEM_INSTRUCTION_VAR).unwrap_or_default(),
            max_retries_per_credential,
            gemini_base_url: get(GEMINI_BASE_URL_VAR),
        })
    }
}
