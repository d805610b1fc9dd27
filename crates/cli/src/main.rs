//! keyrelay CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Wire observability**: `tracing-subscriber` with a JSON layer on stderr
//!    and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP
//!    exporter. All spans and events from every crate flow through it.
//! 2. **Read configuration** from `KEYRELAY_*` environment variables.
//! 3. **Construct** a [`llm::RotatingClient`] for the requested model.
//! 4. **Invoke once** with the prompt read from stdin and print the
//!    [`invocation::CallResult`] as a single JSON line on stdout.
//!
//! Exit codes: `0` success, `2` credential pool exhausted, `1` anything else
//! (including configuration errors).

mod config;
mod observability;

use std::process::ExitCode;

use anyhow::{bail, Context};
use invocation::CallResult;
use llm::{load_model_policy, ClientBuilder, ClientConfig};
use tokio::io::AsyncReadExt;

use crate::config::CliConfig;

const EXIT_FAILURE: u8 = 1;
const EXIT_POOL_EXHAUSTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let telemetry = match observability::init() {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("keyrelay: failed to initialise logging: {err:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let code = match run().await {
        Ok(result) => exit_code(&result),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "keyrelay run failed");
            eprintln!("keyrelay: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    };

    telemetry.shutdown();
    code
}

async fn run() -> anyhow::Result<CallResult> {
    let config = CliConfig::from_env()?;

    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .context("failed to read prompt content from stdin")?;
    if content.trim().is_empty() {
        bail!("no prompt content on stdin");
    }

    let mut client = builder(&config)?.build()?;
    let result = client.invoke(&config.system_instruction, &content).await;

    println!("{}", result.to_json().context("failed to encode call result")?);
    Ok(result)
}

fn builder(config: &CliConfig) -> anyhow::Result<ClientBuilder> {
    let mut client_config = ClientConfig::default();
    if let Some(max) = config.max_retries_per_credential {
        let recovery = client_config
            .recovery
            .clone()
            .with_max_retries_per_credential(max);
        client_config = client_config.with_recovery(recovery);
    }
    if let Some(url) = &config.gemini_base_url {
        client_config = client_config.with_gemini_base_url(url.clone());
    }

    let mut builder = ClientBuilder::new(
        config.model.clone(),
        config.credentials_path.clone(),
        config.state_path.clone(),
    )
    .config(client_config);

    if let Some(path) = &config.policy_path {
        builder = builder.policy(load_model_policy(path)?);
    }
    Ok(builder)
}

fn exit_code(result: &CallResult) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else if result.pool_exhausted {
        ExitCode::from(EXIT_POOL_EXHAUSTED)
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}
