//! `reefscale` — the operator CLI around the autoscaler daemon.
//!
//! The interactive CLI's subcommand menus, prompts, and output formatting
//! are out of scope here; this binary exposes exactly `run`/`check`/
//! `status` and nothing more — no per-resource REST wrapper subcommands
//! (alerts, database users, backups, ...), those stay an enumerated
//! endpoint list, not implemented commands.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reefscale_core::{AutoscalerConfig, Scheduler};

#[derive(Parser)]
#[command(name = "reefscale", version, about = "Fleet autoscaler daemon for a managed database-as-a-service control plane")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Loads the properties file, constructs the scheduler, and runs it
    /// until SIGINT/SIGTERM.
    Run {
        #[arg(long)]
        config: std::path::PathBuf,
    },
    /// Validates configuration and exits without starting the control loop.
    Check {
        #[arg(long)]
        config: std::path::PathBuf,
    },
    /// Stub: no persisted state survives process exit, so there is nothing
    /// for a running process to report once this command is invoked
    /// out-of-process.
    Status,
}

fn init_logging() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Check { config } => check(config).await,
        Command::Status => {
            println!("not connected: the autoscaler persists no state across restarts");
            ExitCode::SUCCESS
        }
    }
}

async fn run(config_path: std::path::PathBuf) -> ExitCode {
    let config = match AutoscalerConfig::load(&config_path).await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "misconfiguration");
            return ExitCode::from(1);
        }
    };

    let scheduler = match Scheduler::new(config) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to construct the scheduler");
            return ExitCode::from(2);
        }
    };

    scheduler.start();

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown signal handler");
        return ExitCode::from(2);
    }

    tracing::info!("shutdown signal received");
    scheduler.stop().await;
    ExitCode::SUCCESS
}

async fn check(config_path: std::path::PathBuf) -> ExitCode {
    match AutoscalerConfig::load(&config_path).await {
        Ok(config) => {
            println!("configuration valid: {} rule(s) across {} project(s)", config.rules.len(), config.project_names.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("misconfiguration: {err}");
            ExitCode::from(1)
        }
    }
}
