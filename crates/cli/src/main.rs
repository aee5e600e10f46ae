//! # ht-collector
//!
//! Collects heating-system telemetry into SQLite and round-robin archives.
//!
//! `run` drives the dispatch engine until Ctrl+C / SIGTERM or the end of the
//! source; `validate`, `info` and `provision` work on the configuration alone.

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_collector, run_info, run_provision, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "ht-collector starting");

    let result = match &cli.command {
        Commands::Run(args) => run_collector(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Provision(args) => run_provision(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Map `-v`/`-q`/`--log-format` onto the shared tracing setup
///
/// `RUST_LOG` still wins over the verbosity flags. The metrics exporter is
/// started later by the `run` pipeline.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let log_format = match cli.log_format {
        cli::LogFormat::Json => observability::LogFormat::Json,
        cli::LogFormat::Pretty => observability::LogFormat::Pretty,
        cli::LogFormat::Compact => observability::LogFormat::Compact,
    };

    observability::init_with_config(observability::ObservabilityConfig {
        log_format,
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
    })
}
