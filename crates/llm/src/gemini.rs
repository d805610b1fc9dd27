//! [`Transport`] over the Gemini `generateContent` REST endpoint.
//!
//! One request per call; no retries, no streaming. Non-2xx responses are
//! reported as `HTTP <status>: <body>` so the classifier sees both the status
//! code and the backend's own wording.

use std::time::Duration;

use async_trait::async_trait;
use invocation::{ConfigurationError, Transport, TransportFailure, TransportRequest, TransportResponse};
use serde::{Deserialize, Serialize};

/// Public Gemini API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// HTTP transport for Gemini models.
#[derive(Debug, Clone)]
pub struct GeminiTransport {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn call(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportFailure> {
        let body = GenerateContentRequest::new(request.system_instruction, request.content);

        let response = self
            .http
            .post(self.endpoint(request.model.as_str()))
            .header("x-goog-api-key", request.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportFailure::new(format!("request failed: {e}")))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| TransportFailure::new(format!("reading response failed: {e}")))?;

        if !status.is_success() {
            return Err(TransportFailure::new(format!(
                "HTTP {}: {}",
                status.as_u16(),
                raw
            )));
        }

        parse_generate_response(raw)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent<'a>>,
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(system_instruction: &'a str, content: &'a str) -> Self {
        let system_instruction = (!system_instruction.trim().is_empty()).then(|| RequestContent {
            role: None,
            parts: vec![RequestPart {
                text: system_instruction,
            }],
        });
        Self {
            system_instruction,
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![RequestPart { text: content }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Extracts the first candidate's text from a 2xx body.
fn parse_generate_response(raw: String) -> Result<TransportResponse, TransportFailure> {
    let parsed: GenerateContentResponse = serde_json::from_str(&raw)
        .map_err(|e| TransportFailure::new(format!("unparseable response body: {e}")))?;

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(TransportFailure::new(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        return Err(TransportFailure::new("response contained no candidates"));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(TransportFailure::new(format!(
            "empty response (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unspecified")
        )));
    }

    Ok(TransportResponse {
        text,
        raw,
        model_version: parsed.model_version,
    })
}
