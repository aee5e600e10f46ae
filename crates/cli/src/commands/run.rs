//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::CollectorBlueprint;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_collector(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    args.overrides.apply(&mut blueprint);
    if blueprint.render.enabled && !blueprint.round_robin.enabled {
        warn!("Render enabled while round-robin is disabled; renders will see stale data");
    }

    info!(
        channels = blueprint.channels.len(),
        relational = blueprint.relational.enabled,
        round_robin = blueprint.round_robin.enabled,
        render = blueprint.render.enabled,
        retention_secs = blueprint.relational.retention_secs,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        memory_round_robin: args.memory_round_robin,
        shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
    });

    info!("Starting collector...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Collector execution failed")?;

    info!(
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        aborted = stats.aborted,
        "Collector finished"
    );
    stats.print_summary();

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &CollectorBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Source: {:?}", blueprint.source.kind);
    if let Some(ref path) = blueprint.source.path {
        println!("  Path: {}", path.display());
    }

    println!("\nRelational sink:");
    println!("  Enabled: {}", blueprint.relational.enabled);
    println!("  Database: {}", blueprint.relational.path.display());
    if blueprint.retention_enabled() {
        println!(
            "  Retention: {}s (reference table '{}')",
            blueprint.relational.retention_secs, blueprint.relational.reference_table
        );
    } else {
        println!("  Retention: disabled");
    }

    println!("\nRound-robin sink:");
    println!("  Enabled: {}", blueprint.round_robin.enabled);
    println!("  Directory: {}", blueprint.round_robin.path.display());
    println!(
        "  Step: {}s, first update after {} steps",
        blueprint.round_robin.step_secs, blueprint.round_robin.warmup_steps
    );

    if blueprint.render.enabled {
        println!("\nRender:");
        println!("  Program: {}", blueprint.render.program);
        println!(
            "  Every {}s, first after {}s",
            blueprint.render.cadence_secs, blueprint.render.initial_delay_secs
        );
    }

    println!("\nChannel groups ({}):", blueprint.channels.len());
    for channel in &blueprint.channels {
        println!(
            "  - {} -> {} ({} items{})",
            channel.nickname,
            channel.table,
            channel.items.len(),
            if channel.round_robin { ", round-robin" } else { "" }
        );
    }

    println!();
}
