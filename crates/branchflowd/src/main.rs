//! branchflowd: run one branch event envelope through branchflow.
//!
//! Usage: `branchflowd [ENVELOPE_FILE]`
//!
//! Reads the envelope from `ENVELOPE_FILE`, or from stdin when no path is
//! given, and prints the invocation outcome as JSON on stdout. Collaborators
//! are the in-memory implementations, so no stack or job is touched.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use branchflow_core::fakes::{MemoryCredentialBroker, MemoryJobLauncher, MemoryStackProvisioner};
use branchflow_core::telemetry::{init_tracing, json_requested};
use branchflow_core::{InvocationOutcome, Orchestrator, TriggerConfig};
use tracing::Level;

fn read_envelope(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read envelope from {}", path)),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read envelope from stdin")?;
            Ok(raw)
        }
    }
}

fn dry_run_orchestrator(config: TriggerConfig) -> Orchestrator {
    let provisioner = Arc::new(MemoryStackProvisioner::in_account(
        config.core_account.account_id.clone(),
        config.core_account.region.clone(),
    ));
    Orchestrator::new(
        config,
        provisioner,
        Arc::new(MemoryCredentialBroker::new()),
        Arc::new(MemoryJobLauncher::new()),
    )
}

async fn run(path: Option<&str>) -> Result<InvocationOutcome> {
    let config = TriggerConfig::from_env().context("invalid trigger configuration")?;
    let raw = read_envelope(path)?;
    let orchestrator = dry_run_orchestrator(config);
    let outcome = orchestrator.handle_str(&raw).await?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(json_requested(), Level::INFO);

    let path = std::env::args().nth(1);
    tracing::info!(version = branchflow_core::VERSION, "branchflowd started");

    let outcome = run(path.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
