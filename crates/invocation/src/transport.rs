//! Port trait for the remote call.
//!
//! The engine never talks HTTP itself. Infrastructure crates implement
//! [`Transport`]; tests substitute scripted doubles.

use async_trait::async_trait;

use crate::{ApiKey, ModelId};

/// Everything needed for one remote call.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// Canonical model to call.
    pub model: &'a ModelId,
    /// Credential secret for this attempt.
    pub api_key: &'a ApiKey,
    /// System instruction text.
    pub system_instruction: &'a str,
    /// User content.
    pub content: &'a str,
}

/// A successful remote response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// Extracted response text.
    pub text: String,
    /// Raw response body.
    pub raw: String,
    /// The model the backend reports having served, if it says.
    pub model_version: Option<String>,
}

/// A failed remote call, carried as text for classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Raw error text (HTTP status and body, or a network error description).
    pub message: String,
}

impl TransportFailure {
    /// Wraps an error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Performs one call against the generative backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Calls the backend once. Implementations must not retry internally.
    async fn call(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn call(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportFailure> {
        (**self).call(request).await
    }
}
