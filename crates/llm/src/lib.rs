//! keyrelay LLM infrastructure.
//!
//! Provides [`RotatingClient`], the resilient credential-rotating client every
//! workflow step uses to call Gemini, together with the file-backed pieces it
//! depends on.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, credential file loading, rotation state
//! persistence and back-off sleeping live here. Classification, governance and
//! back-off arithmetic come from the [`invocation`] crate.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | `ClientBuilder`, `RotatingClient` (the invocation engine) |
//! | [`credentials`] | `CredentialStore` |
//! | [`state`] | `RotationState`, `RotationStateStore` (atomic writes) |
//! | [`config`] | `ClientConfig`, policy-table loading |
//! | [`gemini`] | `GeminiTransport` |
//! | [`sleeper`] | `Sleeper`, `TokioSleeper` |
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> Result<(), invocation::ConfigurationError> {
//! let mut client = llm::RotatingClient::new(
//!     "gemini-2.5-pro",
//!     "credentials.json",
//!     "rotation_state.json",
//! )?;
//! let result = client.invoke("You are a careful reviewer.", "Review this design.").await;
//! if result.pool_exhausted {
//!     eprintln!("retry in {:?} hours", result.earliest_reset_hours);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod gemini;
pub mod sleeper;
pub mod state;

pub use client::{ClientBuilder, RotatingClient};
pub use config::{load_model_policy, ClientConfig, DEFAULT_REQUEST_TIMEOUT};
pub use credentials::CredentialStore;
pub use gemini::{GeminiTransport, DEFAULT_GEMINI_BASE_URL};
pub use sleeper::{Sleeper, TokioSleeper};
pub use state::{CredentialState, RotationState, RotationStateStore, StateStoreError};
