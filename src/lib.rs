// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod protocol;
pub mod recovery;
pub mod stats;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build::{BuildRunner, ConsoleMessageSink};
use crate::cli::CliArgs;
use crate::config::{load_or_default, parse_duration, Settings};
use crate::errors::RunError;
use crate::exec::LaunchSpec;
use crate::stats::Statistics;
use crate::types::CiType;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (file, then agent environment, then CLI flags)
/// - the build runner and its console sink
/// - Ctrl-C handling
///
/// Returns the exit code the binary should exit with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let settings = resolve_settings(&args)?;
    debug!(?settings, "effective settings");

    let spec = launch_spec(&args);

    let stats = Arc::new(Statistics::new());
    let runner = BuildRunner::new(settings)?
        .with_sink(Arc::new(ConsoleMessageSink))
        .with_registry(stats.clone());

    // Ctrl-C -> cancel the run; the process is killed and reported as canceled.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling");
            cancel.cancel();
        });
    }

    match runner.run(spec, Some(cancel)).await {
        Ok(result) => {
            println!("{result}");
            info!(totals = %stats.totals(), "done");
            Ok(exit_code_for(result.exit_code()))
        }
        Err(RunError::Cancelled(result)) => {
            eprintln!("{result}");
            Ok(1)
        }
        Err(err @ RunError::Wait { .. }) => Err(anyhow!(err)),
    }
}

fn resolve_settings(args: &CliArgs) -> Result<Settings> {
    let mut settings = load_or_default(&args.config)
        .with_context(|| format!("loading settings from {}", args.config.display()))?
        .with_env_overrides();

    if let Some(timeout) = &args.timeout {
        let timeout = parse_duration(timeout).map_err(|e| anyhow!("--timeout: {e}"))?;
        settings.timeout = (!timeout.is_zero()).then_some(timeout);
    }
    if let Some(dir) = &args.service_messages {
        settings.ci_type = CiType::TeamCity;
        settings.service_messages_dir = Some(dir.clone());
    }
    Ok(settings)
}

fn launch_spec(args: &CliArgs) -> LaunchSpec {
    let mut spec = LaunchSpec::new(&args.program).args(args.args.iter().cloned());
    if let Some(dir) = &args.working_dir {
        spec = spec.working_dir(dir);
    }
    if let Some(name) = &args.name {
        spec = spec.short_name(name);
    }
    spec
}

/// Child's exit code, or 1 when it has none (killed, failed to start).
fn exit_code_for(code: Option<i32>) -> i32 {
    code.unwrap_or(1)
}
