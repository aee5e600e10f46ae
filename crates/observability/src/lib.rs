//! # Observability
//!
//! Tracing and Prometheus metrics for the collector.
//!
//! ## Usage
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::default())?;
//!
//! observability::record_relational_insert("heizgeraet", true);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    describe_metrics, record_dispatch_latency_ms, record_oldest_entry_age_secs,
    record_relational_insert, record_render, record_retention_sweep, record_round_robin_update,
    record_sample_received, record_sample_unrouted, DispatchAggregator, MetricsSummary,
    RunningStats, StatsSummary,
};

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Human readable
    Pretty,
    /// Single line
    Compact,
}

/// Initialize with a custom configuration
///
/// Fails if a global subscriber or metrics recorder is already installed.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus exporter
///
/// For callers that set up tracing themselves.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;
    describe_metrics();

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
