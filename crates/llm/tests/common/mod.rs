//! Shared test doubles and fixtures.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use invocation::{Transport, TransportFailure, TransportRequest, TransportResponse};
use llm::{ClientBuilder, RotatingClient, Sleeper};
use tempfile::TempDir;

pub const MODEL: &str = "gemini-2.5-pro";

/// Key used for credential `name` in fixtures.
pub fn key_for(name: &str) -> String {
    format!("secret-{name}")
}

pub fn ok(text: &str) -> Result<TransportResponse, TransportFailure> {
    Ok(TransportResponse {
        text: text.to_string(),
        raw: format!(r#"{{"text":"{text}"}}"#),
        model_version: Some(MODEL.to_string()),
    })
}

pub fn fail(message: &str) -> Result<TransportResponse, TransportFailure> {
    Err(TransportFailure::new(message))
}

/// Replays a fixed script of outcomes, then repeats `fallback` forever.
/// Records the key used for every call.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportFailure>>>,
    fallback: Result<TransportResponse, TransportFailure>,
    keys_used: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(
        script: Vec<Result<TransportResponse, TransportFailure>>,
        fallback: Result<TransportResponse, TransportFailure>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            keys_used: Mutex::new(Vec::new()),
        })
    }

    pub fn always(outcome: Result<TransportResponse, TransportFailure>) -> Arc<Self> {
        Self::new(Vec::new(), outcome)
    }

    pub fn keys_used(&self) -> Vec<String> {
        self.keys_used.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.keys_used.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportFailure> {
        self.keys_used
            .lock()
            .unwrap()
            .push(request.api_key.expose().to_string());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Records requested delays without waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays_secs(&self) -> Vec<f64> {
        self.delays
            .lock()
            .unwrap()
            .iter()
            .map(Duration::as_secs_f64)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// A temp directory holding a credentials file and a state file path.
pub struct Fixture {
    pub dir: TempDir,
    pub credentials_path: PathBuf,
    pub state_path: PathBuf,
}

impl Fixture {
    /// Enabled credentials with the given names, in order.
    pub fn with_credentials(names: &[&str]) -> Self {
        let entries: Vec<(&str, bool)> = names.iter().map(|n| (*n, true)).collect();
        Self::with_entries(&entries)
    }

    /// Credentials as `(name, enabled)` pairs, in order.
    pub fn with_entries(entries: &[(&str, bool)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let credentials_path = dir.path().join("credentials.json");
        let state_path = dir.path().join("state").join("rotation_state.json");

        let credentials: Vec<serde_json::Value> = entries
            .iter()
            .map(|(name, enabled)| {
                serde_json::json!({
                    "name": name,
                    "key": key_for(name),
                    "type": "api_key",
                    "enabled": enabled,
                })
            })
            .collect();
        write_json(
            &credentials_path,
            &serde_json::json!({ "credentials": credentials }),
        );

        Self {
            dir,
            credentials_path,
            state_path,
        }
    }

    pub fn builder(&self) -> ClientBuilder {
        ClientBuilder::new(MODEL, &self.credentials_path, &self.state_path)
    }

    pub fn client(
        &self,
        transport: Arc<ScriptedTransport>,
        sleeper: Arc<RecordingSleeper>,
    ) -> RotatingClient<Arc<ScriptedTransport>, Arc<RecordingSleeper>> {
        self.builder().build_with(transport, sleeper).unwrap()
    }

    pub fn state_json(&self) -> serde_json::Value {
        let raw = std::fs::read_to_string(&self.state_path).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn write_state(&self, value: &serde_json::Value) {
        std::fs::create_dir_all(self.state_path.parent().unwrap()).unwrap();
        write_json(&self.state_path, value);
    }
}

pub fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}
