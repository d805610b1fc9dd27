//! Core invocation domain for keyrelay.
//!
//! This crate contains every domain concept used by the credential-rotating
//! client: identifiers, value types, the model governance policy, the error
//! classifier, back-off and reset-time arithmetic, and the [`Transport`] port.
//! Infrastructure crates implement the port; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`CredentialName`, `ModelId`, `InvocationId`) |
//! | [`types`] | Value types (`Timestamp`, `ApiKey`, `Credential`, `ErrorKind`, `CallResult`) |
//! | [`errors`] | `ConfigurationError` and the `Recovery` decision |
//! | [`governor`] | `ModelPolicy` validation |
//! | [`classifier`] | Error text → `ErrorKind` |
//! | [`backoff`] | Capped exponential delay |
//! | [`reset`] | Quota reset-time extraction |
//! | [`recovery`] | `ErrorKind` → `Recovery` rules |
//! | [`transport`] | The `Transport` port trait |

pub mod backoff;
pub mod classifier;
pub mod errors;
pub mod governor;
pub mod identifiers;
pub mod recovery;
pub mod reset;
pub mod transport;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use backoff::BackoffPolicy;
pub use classifier::classify;
pub use errors::{ConfigurationError, Recovery};
pub use governor::{ModelPolicy, DEFAULT_FORBIDDEN_MODELS, GEMINI_FAMILY_PREFIX};
pub use identifiers::{CredentialName, InvocationId, ModelId};
pub use recovery::{
    RecoveryRules, DEFAULT_CAPACITY_COOLDOWN_HOURS, DEFAULT_MAX_RETRIES_PER_CREDENTIAL,
    DEFAULT_QUOTA_COOLDOWN_HOURS,
};
pub use reset::parse_reset_hours;
pub use transport::{Transport, TransportFailure, TransportRequest, TransportResponse};
pub use types::{ApiKey, CallResult, Credential, CredentialType, ErrorKind, Timestamp};
