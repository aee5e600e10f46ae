//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::CollectorBlueprint;
use std::path::PathBuf;
use tracing::info;

/// ht-collector - heating telemetry collector
#[derive(Parser, Debug)]
#[command(
    name = "ht-collector",
    author,
    version,
    about = "Heating telemetry collector",
    long_about = "Collects decoded heating-system readings and stores them in an SQLite \n\
                  database and round-robin archives, with retention and periodic \n\
                  rendering of the archived data."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "HT_COLLECTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "HT_COLLECTOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the collector until the source ends or a stop signal arrives
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Create database tables and round-robin archives, then exit
    Provision(ProvisionArgs),
}

/// Sink overrides shared by `run` and `provision`
#[derive(Args, Debug, Clone, Default)]
pub struct SinkOverrides {
    /// Override the SQLite database path
    #[arg(long, env = "HT_COLLECTOR_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Disable the relational sink
    #[arg(long)]
    pub no_relational: bool,

    /// Disable the round-robin sink
    #[arg(long)]
    pub no_round_robin: bool,
}

impl SinkOverrides {
    /// Apply the overrides to a loaded blueprint
    pub fn apply(&self, blueprint: &mut CollectorBlueprint) {
        if let Some(ref path) = self.db_path {
            info!(path = %path.display(), "Overriding database path from CLI");
            blueprint.relational.path = path.clone();
        }
        if self.no_relational {
            info!("Relational sink disabled from CLI");
            blueprint.relational.enabled = false;
        }
        if self.no_round_robin {
            info!("Round-robin sink disabled from CLI");
            blueprint.round_robin.enabled = false;
        }
    }
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "collector.toml",
        env = "HT_COLLECTOR_CONFIG"
    )]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: SinkOverrides,

    /// Keep round-robin data in memory instead of driving rrdtool
    #[arg(long)]
    pub memory_round_robin: bool,

    /// Seconds to wait for the engine after a stop signal before aborting it
    #[arg(long, default_value = "10", env = "HT_COLLECTOR_SHUTDOWN_GRACE")]
    pub shutdown_grace_secs: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "HT_COLLECTOR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "collector.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "collector.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the items of every channel group
    #[arg(long)]
    pub items: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Arguments for the `provision` command
#[derive(Parser, Debug)]
pub struct ProvisionArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "collector.toml", env = "HT_COLLECTOR_CONFIG")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: SinkOverrides,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
