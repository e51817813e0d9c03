//! # Policy Debugger - Console Entry Point
//!
//! Sends one debug request for an API, waits for the gateway to replay it
//! through the policy chain, and prints the reconstructed trace as JSON.
//!
//! ```text
//! policy-debugger <api-id> [request.json]
//! ```
//!
//! Configuration is read from the file named by `DEBUG_CONSOLE_CONFIG` (YAML, or
//! JSON when the extension is `.json`). Without it, defaults are used together
//! with the `DEBUG_CONSOLE_*` environment overrides. Ctrl-C cancels the run.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tokio::signal;
use tracing::{info, warn};

use policy_debugger::observability::init_logging;
use policy_debugger::{
    ApiVersion, DebugConsoleConfig, DebugRequest, DebugSession, ManagementClient, SessionState,
};

const DEFAULT_BASE_URL: &str =
    "http://localhost:8083/management/organizations/DEFAULT/environments/DEFAULT";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let api_id = match args.next() {
        Some(api_id) => api_id,
        None => bail!("usage: policy-debugger <api-id> [request.json]"),
    };
    let request = match args.next() {
        Some(path) => load_request(&path).await?,
        None => DebugRequest::default(),
    };

    let config = load_config().await?;
    init_logging(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), %api_id, "Starting policy debugger");

    let client = ManagementClient::new(&config.management)?;
    let session = DebugSession::new(api_id, Arc::new(client), config.polling.clone());

    if let Err(e) = session.load_policies().await {
        warn!(error = %e, "Policy catalog unavailable, timeline will show policy ids");
    }

    session.send(request)?;

    let state = tokio::select! {
        state = session.wait_until_settled() => state?,
        _ = signal::ctrl_c() => {
            session.cancel();
            SessionState::Cancelled
        }
    };

    match state {
        SessionState::Success(view) => {
            let timeline: Vec<_> = view
                .timeline
                .entries
                .iter()
                .map(|entry| json!({ "title": entry.title(), "clickable": entry.clickable }))
                .collect();
            let output = json!({
                "summary": view.response.summary(),
                "timeline": timeline,
                "request": view.request_overview(),
                "response": view.response_overview(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        SessionState::Cancelled => bail!("debug request cancelled"),
        other => match other.notification() {
            Some(message) => bail!("{}", message),
            None => bail!("debug request ended in unexpected state {:?}", other),
        },
    }
}

async fn load_config() -> Result<DebugConsoleConfig> {
    let config = match std::env::var("DEBUG_CONSOLE_CONFIG") {
        Ok(path) if path.ends_with(".json") => DebugConsoleConfig::load_from_json(&path).await?,
        Ok(path) => DebugConsoleConfig::load_from_file(&path).await?,
        Err(_) => {
            let mut config = DebugConsoleConfig::new(DEFAULT_BASE_URL, ApiVersion::V2);
            config.apply_env_overrides()?;
            config.validate()?;
            config
        }
    };
    Ok(config)
}

async fn load_request(path: &str) -> Result<DebugRequest> {
    let content = tokio::fs::read_to_string(Path::new(path))
        .await
        .with_context(|| format!("failed to read debug request {}", path))?;
    let request: DebugRequest = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse debug request {}", path))?;
    Ok(request)
}
