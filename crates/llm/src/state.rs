//! Durable per-credential rotation state.
//!
//! File format:
//!
//! ```json
//! { "key-1": {"exhausted_until": "2026-10-18T21:04:00Z"}, "key-2": {"exhausted_until": null, "disabled": true} }
//! ```
//!
//! This file is the only state shared across separate runs of the tool. Every
//! write goes to a uniquely named temp file in the same directory which is
//! then renamed over the target, so a killed process never leaves a truncated
//! file behind. There is no advisory lock: when two processes write at the same
//! moment the last rename wins, and [`RotationStateStore::update`] re-reads the
//! file immediately before writing to keep that window small.
//!
//! Entries are parsed one at a time. An entry that does not parse is logged
//! and carried through unchanged on every later write, and it keeps its
//! credential out of rotation if it says `"disabled": true`. A file that is not
//! a JSON object at all is moved aside to `<file>.corrupt` by
//! [`RotationStateStore::update`] before a fresh file is written.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use invocation::{CredentialName, ErrorKind, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failures reading or writing the rotation state file.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// The file exists but could not be read.
    #[error("rotation state {} could not be read: {source}", path.display())]
    Read {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("rotation state {} is corrupt: {source}", path.display())]
    Corrupt {
        /// State file path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be encoded.
    #[error("rotation state could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    /// The temp file could not be written or renamed into place.
    #[error("rotation state {} could not be written: {source}", path.display())]
    Write {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// State values
// ---------------------------------------------------------------------------

/// What is known about one credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialState {
    /// The credential is out of rotation until this instant.
    #[serde(default)]
    pub exhausted_until: Option<Timestamp>,

    /// The credential was rejected and will not recover without an external
    /// reset.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    /// The failure that produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorKind>,
}

impl CredentialState {
    /// An entry that keeps the credential out of rotation until `until`.
    pub fn exhausted(until: Timestamp, kind: ErrorKind) -> Self {
        Self {
            exhausted_until: Some(until),
            disabled: false,
            last_error: Some(kind),
        }
    }

    /// An entry that keeps the credential out of rotation permanently.
    pub fn disabled(kind: ErrorKind) -> Self {
        Self {
            exhausted_until: None,
            disabled: true,
            last_error: Some(kind),
        }
    }

    /// Returns `true` if the credential may be selected at `now`.
    pub fn is_available(&self, now: Timestamp) -> bool {
        if self.disabled {
            return false;
        }
        match self.exhausted_until {
            Some(until) => until <= now,
            None => true,
        }
    }
}

/// Mapping from credential name to [`CredentialState`].
///
/// Credentials with no entry have never failed and are available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawState", into = "RawState")]
pub struct RotationState {
    entries: BTreeMap<CredentialName, CredentialState>,
    /// Entries that did not parse, kept verbatim.
    unreadable: BTreeMap<String, Value>,
}

type RawState = BTreeMap<String, Value>;

impl From<RawState> for RotationState {
    fn from(raw: RawState) -> Self {
        let mut state = RotationState::default();
        for (key, value) in raw {
            let parsed = CredentialName::new(key.as_str()).and_then(|name| {
                serde_json::from_value::<CredentialState>(value.clone())
                    .ok()
                    .map(|entry| (name, entry))
            });
            match parsed {
                Some((name, entry)) => {
                    state.entries.insert(name, entry);
                }
                None => {
                    tracing::warn!(entry = %key, "Unreadable rotation state entry kept as-is");
                    state.unreadable.insert(key, value);
                }
            }
        }
        state
    }
}

impl From<RotationState> for RawState {
    fn from(state: RotationState) -> Self {
        let mut raw = state.unreadable;
        for (name, entry) in state.entries {
            match serde_json::to_value(&entry) {
                Ok(value) => {
                    raw.insert(name.as_str().to_string(), value);
                }
                Err(err) => {
                    tracing::error!(credential = %name, error = %err, "Rotation state entry not encodable");
                }
            }
        }
        raw
    }
}

impl RotationState {
    /// Returns the entry for `name`, if one exists.
    pub fn get(&self, name: &CredentialName) -> Option<&CredentialState> {
        self.entries.get(name)
    }

    /// Replaces the entry for `name`, including an unreadable one.
    pub fn set(&mut self, name: CredentialName, state: CredentialState) {
        self.unreadable.remove(name.as_str());
        self.entries.insert(name, state);
    }

    /// Removes the entry for `name`, returning `true` if one existed.
    pub fn remove(&mut self, name: &CredentialName) -> bool {
        let unreadable = self.unreadable.remove(name.as_str()).is_some();
        self.entries.remove(name).is_some() || unreadable
    }

    /// Returns `true` if `name` may be selected at `now`.
    pub fn is_available(&self, name: &CredentialName, now: Timestamp) -> bool {
        if let Some(raw) = self.unreadable.get(name.as_str()) {
            return raw.get("disabled").and_then(Value::as_bool) != Some(true);
        }
        self.entries.get(name).map_or(true, |s| s.is_available(now))
    }

    /// Names of entries that could not be parsed.
    pub fn unreadable(&self) -> impl Iterator<Item = &str> {
        self.unreadable.keys().map(String::as_str)
    }

    /// Hours until the soonest of `names` leaves its exhaustion window.
    ///
    /// Disabled credentials and credentials that are already available are
    /// ignored; `None` when nothing is waiting on a reset.
    pub fn earliest_reset_hours<'a, I>(&self, names: I, now: Timestamp) -> Option<f64>
    where
        I: IntoIterator<Item = &'a CredentialName>,
    {
        names
            .into_iter()
            .filter_map(|name| self.entries.get(name))
            .filter(|s| !s.disabled)
            .filter_map(|s| s.exhausted_until)
            .filter(|until| *until > now)
            .map(|until| until.hours_since(now))
            .min_by(f64::total_cmp)
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&CredentialName, &CredentialState)> {
        self.entries.iter()
    }

    /// Number of tracked credentials, unreadable entries included.
    pub fn len(&self) -> usize {
        self.entries.len() + self.unreadable.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unreadable.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Reads and atomically rewrites the rotation state file.
#[derive(Debug, Clone)]
pub struct RotationStateStore {
    path: PathBuf,
}

impl RotationStateStore {
    /// Creates a store for `path`. Nothing is read until [`Self::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The state file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current state. A missing or empty file is an empty state.
    pub fn load(&self) -> Result<RotationState, StateStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RotationState::default());
            }
            Err(source) => {
                return Err(StateStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(RotationState::default());
        }

        serde_json::from_str(&raw).map_err(|source| StateStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the file with `state` via temp file + rename.
    pub fn save(&self, state: &RotationState) -> Result<(), StateStoreError> {
        let json = serde_json::to_string_pretty(state).map_err(StateStoreError::Encode)?;
        let write_err = |source| StateStoreError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::trace!(path = %self.path.display(), entries = state.len(), "Rotation state written");
        Ok(())
    }

    /// Read-modify-write: applies `change` to the freshest on-disk state and
    /// writes it back, returning what was written.
    ///
    /// A file that cannot be parsed is moved to [`Self::quarantine_path`]
    /// first and `change` is applied to an empty state.
    pub fn update<F>(&self, change: F) -> Result<RotationState, StateStoreError>
    where
        F: FnOnce(&mut RotationState),
    {
        let mut state = match self.load() {
            Ok(state) => state,
            Err(err @ StateStoreError::Corrupt { .. }) => {
                self.quarantine()?;
                tracing::error!(
                    error = %err,
                    moved_to = %self.quarantine_path().display(),
                    "Corrupt rotation state moved aside"
                );
                RotationState::default()
            }
            Err(err) => return Err(err),
        };
        change(&mut state);
        self.save(&state)?;
        Ok(state)
    }

    /// Where an unparseable state file is moved: `<file>.corrupt`.
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn quarantine(&self) -> Result<(), StateStoreError> {
        let target = self.quarantine_path();
        std::fs::rename(&self.path, &target).map_err(|source| StateStoreError::Write {
            path: target,
            source,
        })
    }

    /// Forgets everything known about `name`, returning `true` if an entry
    /// was removed. This is the external reset for disabled credentials.
    pub fn reset(&self, name: &CredentialName) -> Result<bool, StateStoreError> {
        let mut removed = false;
        self.update(|state| removed = state.remove(name))?;
        if removed {
            tracing::info!(credential = %name, "Rotation state entry reset");
        }
        Ok(removed)
    }

    /// Forgets everything.
    pub fn clear(&self) -> Result<(), StateStoreError> {
        self.save(&RotationState::default())?;
        tracing::info!(path = %self.path.display(), "Rotation state cleared");
        Ok(())
    }
}
