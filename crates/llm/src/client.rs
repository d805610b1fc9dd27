//! The credential-rotating client.
//!
//! One [`RotatingClient::invoke`] walks the credential pool in file order:
//!
//! ```text
//! SelectCredential ──► Call ──► Evaluate ──┬─► Success
//!        ▲                 ▲               ├─► Retry (same credential, after back-off)
//!        │                 └───────────────┘
//!        └──────────────── Rotate ◄────────┤
//!                                          └─► PoolExhausted / all tried
//! ```
//!
//! Auth failures disable the credential, quota failures park it until its
//! reset time, capacity failures are retried with back-off before parking it
//! briefly, and unknown failures move on without recording anything. Every
//! state change is written to the rotation state file before the next call.

use std::path::PathBuf;
use std::time::Instant;

use invocation::{
    classify, CallResult, ConfigurationError, Credential, CredentialName, ErrorKind, InvocationId,
    ModelId, ModelPolicy, Recovery, RecoveryRules, Timestamp, Transport, TransportRequest,
    TransportResponse,
};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::gemini::GeminiTransport;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::state::{CredentialState, RotationState, RotationStateStore};

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Assembles a [`RotatingClient`].
///
/// Validation order is fixed: the model is checked against the policy first,
/// then the credentials file is read. Nothing touches the network.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    model: String,
    credentials_path: PathBuf,
    state_path: PathBuf,
    policy: ModelPolicy,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Starts a builder with the default policy and configuration.
    pub fn new(
        model: impl Into<String>,
        credentials_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model: model.into(),
            credentials_path: credentials_path.into(),
            state_path: state_path.into(),
            policy: ModelPolicy::default(),
            config: ClientConfig::default(),
        }
    }

    /// Replaces the model policy.
    pub fn policy(mut self, policy: ModelPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds a client backed by the Gemini HTTP transport.
    pub fn build(self) -> Result<RotatingClient<GeminiTransport, TokioSleeper>, ConfigurationError> {
        let (model, credentials) = self.validate()?;
        let transport = GeminiTransport::new(self.config.request_timeout)?
            .with_base_url(self.config.gemini_base_url.clone());
        Ok(self.assemble(model, credentials, transport, TokioSleeper))
    }

    /// Builds a client with an injected transport and sleeper.
    pub fn build_with<T, S>(
        self,
        transport: T,
        sleeper: S,
    ) -> Result<RotatingClient<T, S>, ConfigurationError>
    where
        T: Transport,
        S: Sleeper,
    {
        let (model, credentials) = self.validate()?;
        Ok(self.assemble(model, credentials, transport, sleeper))
    }

    fn validate(&self) -> Result<(ModelId, CredentialStore), ConfigurationError> {
        let model = self.policy.validate(&self.model)?;
        let credentials = CredentialStore::load(&self.credentials_path)?;
        Ok((model, credentials))
    }

    fn assemble<T, S>(
        self,
        model: ModelId,
        credentials: CredentialStore,
        transport: T,
        sleeper: S,
    ) -> RotatingClient<T, S> {
        tracing::info!(
            model = %model,
            credentials = credentials.len(),
            state = %self.state_path.display(),
            "Rotating client ready"
        );
        RotatingClient {
            model,
            credentials,
            state_store: RotationStateStore::new(self.state_path),
            rules: self.config.recovery,
            transport,
            sleeper,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A governed, credential-rotating client for one model.
///
/// `invoke` takes `&mut self`: an instance serves one call at a time. Run one
/// instance per worker for parallel throughput.
pub struct RotatingClient<T, S = TokioSleeper> {
    model: ModelId,
    credentials: CredentialStore,
    state_store: RotationStateStore,
    rules: RecoveryRules,
    transport: T,
    sleeper: S,
}

impl RotatingClient<GeminiTransport, TokioSleeper> {
    /// Validates `model` against the default policy, loads the credential
    /// pool, and wires the Gemini transport.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] for a forbidden or foreign model, or a missing
    /// or malformed credentials file.
    pub fn new(
        model: &str,
        credentials_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigurationError> {
        ClientBuilder::new(model, credentials_path, state_path).build()
    }
}

impl<T, S> RotatingClient<T, S>
where
    T: Transport,
    S: Sleeper,
{
    /// The validated model.
    pub fn model(&self) -> &ModelId {
        &self.model
    }

    /// The credential pool.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// The rotation state file.
    pub fn state_store(&self) -> &RotationStateStore {
        &self.state_store
    }

    /// Calls the model, rotating credentials as needed.
    ///
    /// Never fails: every remote failure is absorbed into the returned
    /// [`CallResult`]. Check [`CallResult::pool_exhausted`] to learn that no
    /// credential is currently usable.
    #[tracing::instrument(
        name = "invoke",
        skip_all,
        fields(model = %self.model, invocation_id = tracing::field::Empty)
    )]
    pub async fn invoke(&mut self, system_instruction: &str, content: &str) -> CallResult {
        let started = Instant::now();
        let mut run = Run::new(self.model.clone());
        tracing::Span::current().record("invocation_id", tracing::field::display(run.id));

        let mut state = self.load_state();

        while let Some(credential) = self.next_candidate(&state, &run.tried) {
            if let Some(previous) = run.tried.last() {
                tracing::info!(from = %previous, to = %credential.name, "Rotating credential");
            }
            run.tried.push(credential.name.clone());

            let mut attempts_on_credential = 0u32;
            loop {
                run.attempts += 1;
                let request = TransportRequest {
                    model: &self.model,
                    api_key: &credential.key,
                    system_instruction,
                    content,
                };

                let failure = match self.transport.call(request).await {
                    Ok(response) => return run.succeed(response, started),
                    Err(failure) => failure,
                };

                let message = credential.key.redact_from(&failure.message);
                let kind = classify(&message);
                let decision = self.rules.decide(kind, &message, attempts_on_credential);
                tracing::warn!(
                    credential = %credential.name,
                    error_kind = %kind,
                    attempt = run.attempts,
                    rotating = decision.rotates(),
                    "Call failed"
                );
                run.last_error = Some((kind, message));

                match decision {
                    Recovery::RetrySameCredential { after } => {
                        tracing::info!(
                            credential = %credential.name,
                            delay_secs = after.as_secs_f64(),
                            retry = attempts_on_credential + 1,
                            "Backing off before retrying"
                        );
                        self.sleeper.sleep(after).await;
                        attempts_on_credential += 1;
                    }
                    Recovery::Rotate { cooldown_hours } => {
                        let until = Timestamp::now().plus_hours(cooldown_hours);
                        tracing::info!(
                            credential = %credential.name,
                            until = %until,
                            "Credential exhausted"
                        );
                        self.persist(
                            &mut state,
                            &credential.name,
                            CredentialState::exhausted(until, kind),
                        );
                        run.reset_estimates.push(cooldown_hours);
                        break;
                    }
                    Recovery::Disable => {
                        tracing::warn!(credential = %credential.name, "Credential disabled");
                        self.persist(&mut state, &credential.name, CredentialState::disabled(kind));
                        break;
                    }
                    Recovery::RotateWithoutCooldown => break,
                }
            }
        }

        self.finish_failed(run, &state, started)
    }

    /// First enabled, currently available credential not yet tried in this call.
    fn next_candidate(&self, state: &RotationState, tried: &[CredentialName]) -> Option<&Credential> {
        let now = Timestamp::now();
        self.credentials
            .candidates()
            .filter(|c| !tried.contains(&c.name))
            .find(|c| state.is_available(&c.name, now))
    }

    fn load_state(&self) -> RotationState {
        self.state_store.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Rotation state unreadable; starting from empty state");
            RotationState::default()
        })
    }

    /// Records `entry` in memory and on disk, merging with whatever other
    /// runs have written since this call started.
    ///
    /// On failure the file is left untouched; the in-memory view still
    /// governs the rest of this call.
    fn persist(&self, state: &mut RotationState, name: &CredentialName, entry: CredentialState) {
        state.set(name.clone(), entry.clone());

        match self.state_store.update(|disk| disk.set(name.clone(), entry)) {
            Ok(merged) => *state = merged,
            Err(err) => {
                tracing::error!(credential = %name, error = %err, "Rotation state not persisted");
            }
        }
    }

    fn finish_failed(&self, run: Run, state: &RotationState, started: Instant) -> CallResult {
        let now = Timestamp::now();
        let pool_exhausted = !self
            .credentials
            .candidates()
            .any(|c| state.is_available(&c.name, now));

        let earliest_reset_hours = run
            .reset_estimates
            .iter()
            .copied()
            .min_by(f64::total_cmp)
            .or_else(|| {
                if pool_exhausted {
                    state.earliest_reset_hours(state.iter().map(|(name, _)| name), now)
                } else {
                    None
                }
            });

        if pool_exhausted {
            tracing::error!(
                attempts = run.attempts,
                earliest_reset_hours,
                "Credential pool exhausted"
            );
        }

        run.fail(pool_exhausted, earliest_reset_hours, started)
    }
}

// ---------------------------------------------------------------------------
// Per-call bookkeeping
// ---------------------------------------------------------------------------

/// Accumulates what happened during one `invoke()`.
struct Run {
    id: InvocationId,
    model: ModelId,
    /// Distinct credentials attempted, in order.
    tried: Vec<CredentialName>,
    attempts: u32,
    last_error: Option<(ErrorKind, String)>,
    /// Cooldowns (hours) recorded for credentials marked exhausted.
    reset_estimates: Vec<f64>,
}

impl Run {
    fn new(model: ModelId) -> Self {
        Self {
            id: InvocationId::new(),
            model,
            tried: Vec::new(),
            attempts: 0,
            last_error: None,
            reset_estimates: Vec::new(),
        }
    }

    fn succeed(self, response: TransportResponse, started: Instant) -> CallResult {
        let model_verified = response
            .model_version
            .unwrap_or_else(|| self.model.to_string());

        tracing::info!(
            credential = self.tried.last().map(|c| c.as_str()),
            attempts = self.attempts,
            "Call succeeded"
        );

        let result = CallResult {
            invocation_id: self.id,
            success: true,
            response: Some(response.text),
            raw_response: Some(response.raw),
            error_kind: None,
            error_message: None,
            model_requested: self.model,
            model_verified: Some(model_verified),
            duration_ms: elapsed_ms(started),
            rotation_occurred: self.tried.len() > 1,
            credential_used: self.tried.last().cloned(),
            attempts: self.attempts,
            pool_exhausted: false,
            earliest_reset_hours: None,
        };

        if result.model_matches_request() == Some(false) {
            tracing::warn!(
                requested = %result.model_requested,
                served = result.model_verified.as_deref(),
                "Backend reported a different model than requested"
            );
        }
        result
    }

    fn fail(
        self,
        pool_exhausted: bool,
        earliest_reset_hours: Option<f64>,
        started: Instant,
    ) -> CallResult {
        let (error_kind, error_message) = match self.last_error {
            Some((kind, message)) => (Some(kind), Some(message)),
            None => (None, Some("no usable credential in pool".to_string())),
        };

        CallResult {
            invocation_id: self.id,
            success: false,
            response: None,
            raw_response: None,
            error_kind,
            error_message,
            model_requested: self.model,
            model_verified: None,
            duration_ms: elapsed_ms(started),
            rotation_occurred: self.tried.len() > 1,
            credential_used: self.tried.last().cloned(),
            attempts: self.attempts,
            pool_exhausted,
            earliest_reset_hours,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
