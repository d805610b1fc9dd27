//! Newtype domain identifiers.
//!
//! Every concept with an identity is a distinct newtype wrapping a primitive,
//! so a [`CredentialName`] can never be passed where a [`ModelId`] is expected
//! even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Identifies one credential in the pool.
    ///
    /// This is the only credential attribute that is ever logged, persisted in
    /// the rotation state file, or surfaced in a [`crate::CallResult`].
    CredentialName
}

string_id! {
    /// A canonical model identifier (e.g. `gemini-2.5-pro`).
    ///
    /// Only [`crate::ModelPolicy::validate`] produces values that are known to
    /// satisfy the provider policy; constructing one directly skips governance.
    ModelId
}

// ---------------------------------------------------------------------------

/// Identifies a single `invoke()` call.
///
/// Generated fresh for every call and recorded on the tracing span and the
/// [`crate::CallResult`], so the upstream audit log can be correlated with
/// the client's own events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generates a new random [`InvocationId`].
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
