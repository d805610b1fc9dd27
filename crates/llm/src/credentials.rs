//! Loading the ordered credential pool.
//!
//! File format:
//!
//! ```json
//! { "credentials": [ {"name": "key-1", "key": "...", "type": "api_key", "enabled": true} ] }
//! ```
//!
//! Entry order is the rotation order. Nothing is ever re-sorted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use invocation::{ConfigurationError, Credential, CredentialName};
use serde::Deserialize;

#[derive(Deserialize)]
struct CredentialsFile {
    credentials: Vec<Credential>,
}

/// The credential pool, fixed at load time.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: Vec<Credential>,
}

impl CredentialStore {
    /// Reads and validates the credentials file at `path`.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::CredentialsNotFound`] if the file is missing.
    /// - [`ConfigurationError::CredentialsUnreadable`] on other I/O failures.
    /// - [`ConfigurationError::MalformedCredentials`] if the JSON is invalid,
    ///   the pool is empty, or names are empty or duplicated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigurationError::CredentialsNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigurationError::CredentialsUnreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let store = Self::from_json(&raw).map_err(|message| {
            ConfigurationError::MalformedCredentials {
                path: path.to_path_buf(),
                message,
            }
        })?;

        tracing::debug!(
            path = %path.display(),
            total = store.len(),
            enabled = store.candidates().count(),
            "Loaded credential pool"
        );
        Ok(store)
    }

    /// Builds a store from an in-memory credential list, applying the same
    /// rules as [`CredentialStore::load`].
    pub fn from_credentials(credentials: Vec<Credential>) -> Result<Self, ConfigurationError> {
        Self::validated(credentials).map_err(|message| ConfigurationError::MalformedCredentials {
            path: PathBuf::from("<memory>"),
            message,
        })
    }

    fn from_json(raw: &str) -> Result<Self, String> {
        // serde_json messages can quote field values; report position only so
        // key material never leaks into an error.
        let file: CredentialsFile = serde_json::from_str(raw).map_err(|e| {
            format!(
                "invalid JSON ({:?} error at line {}, column {})",
                e.classify(),
                e.line(),
                e.column()
            )
        })?;
        Self::validated(file.credentials)
    }

    fn validated(credentials: Vec<Credential>) -> Result<Self, String> {
        if credentials.is_empty() {
            return Err("no credentials defined".to_string());
        }

        let mut seen = HashSet::new();
        for (index, credential) in credentials.iter().enumerate() {
            if credential.name.as_str().trim().is_empty() {
                return Err(format!("credential #{index} has an empty name"));
            }
            if !seen.insert(credential.name.as_str()) {
                return Err(format!("duplicate credential name '{}'", credential.name));
            }
        }

        Ok(Self { credentials })
    }

    /// All credentials, disabled ones included, in file order.
    pub fn all(&self) -> &[Credential] {
        &self.credentials
    }

    /// Enabled credentials in rotation order.
    pub fn candidates(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter().filter(|c| c.enabled)
    }

    /// Looks up a credential by name.
    pub fn get(&self, name: &CredentialName) -> Option<&Credential> {
        self.credentials.iter().find(|c| &c.name == name)
    }

    /// Number of credentials in the pool, disabled ones included.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Returns `true` if the pool holds no credentials.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
