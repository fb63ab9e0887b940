//! ko-cli: operator tool for the Knowledge OS guardrails.

mod config;
mod replay;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ko_core::mode::WorkspaceMode;
use ko_core::policy::GuardedAction;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ko-cli", version, about = "Inspect and replay Knowledge OS guardrail policies")]
struct Cli {
    /// Guardrail settings file (JSON). Defaults to $KO_GUARDRAILS_CONFIG,
    /// then <config dir>/knowledge-os/guardrails.json.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective guardrail policy as JSON.
    Policy {
        /// Only show the ceilings for this workspace mode.
        #[arg(long)]
        mode: Option<WorkspaceMode>,
    },
    /// Replay a JSON-lines request log through a fresh guardrail store.
    Replay {
        /// File with one request per line.
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Policy { mode: None } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Policy { mode: Some(mode) } => {
            let view: Vec<_> = GuardedAction::ALL
                .iter()
                .map(|&action| {
                    let policy = settings.policy(action);
                    serde_json::json!({
                        "action": action,
                        "mode": mode,
                        "dedupe_ms": policy.dedupe_ms,
                        "config": policy.config_for(mode),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Replay { file } => {
            let input = File::open(&file)
                .with_context(|| format!("failed to open replay log {}", file.display()))?;
            let summary = replay::replay(BufReader::new(input), io::stdout().lock(), &settings)?;
            tracing::info!(
                total = summary.total,
                admitted = summary.admitted,
                rejected = summary.rejected,
                "replay finished"
            );
        }
    }

    Ok(())
}
