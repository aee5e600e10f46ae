//! Mock Pipeline Example
//!
//! Runs the dispatch engine against synthetic samples with an in-memory
//! database and round-robin store. No capture file or rrdtool needed.
//!
//! Run with: cargo run -p demos --bin mock_pipeline [collector.toml]

use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{CollectorBlueprint, RunSignal};
use dispatcher::{open_round_robin, EngineBuilder, MemoryRoundRobin, SqliteSink};
use ingestion::{MockSampleSource, MockSourceConfig};

const DEFAULT_CONFIG: &str = r#"
[source]
kind = "mock"

[relational]
path = ":memory:"

[round_robin]
enabled = true
step_secs = 1
warmup_steps = 0

[[channels]]
nickname = "HG"
table = "heizgeraet"
[[channels.items]]
name = "T_vorlauf"
default = 45.0
[[channels.items]]
name = "Brenner"
datatype = "int"

[[channels]]
nickname = "WW"
table = "warmwasser"
[[channels.items]]
name = "T_speicher"
default = 50.0
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_with_config(observability::ObservabilityConfig {
        log_format: observability::LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    tracing::info!("Starting Mock Pipeline Demo");

    let blueprint: CollectorBlueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading collector config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        ConfigLoader::load_from_str(DEFAULT_CONFIG, ConfigFormat::Toml)?
    };

    let mut relational = SqliteSink::open_in_memory()?;
    relational.provision(&blueprint.channels)?;

    let store = MemoryRoundRobin::new();
    let round_robin = open_round_robin(&blueprint, store.clone()).await?;

    let source = MockSampleSource::from_blueprint(
        &blueprint,
        MockSourceConfig {
            count: 40,
            interval: Duration::from_millis(100),
        },
    );

    let engine = EngineBuilder::new(blueprint.clone(), relational)
        .round_robin(round_robin)
        .build();
    let metrics = engine.metrics();

    let signal = RunSignal::new();
    let handle = engine.spawn(source, signal.clone());

    // Stop early on Ctrl+C
    let stopper = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    let report = handle.await?;

    for channel in blueprint.channels.iter().filter(|c| c.round_robin) {
        tracing::info!(
            group = %channel.table,
            updates = store.update_count(&channel.table),
            "Round-robin archive"
        );
    }
    tracing::info!(
        reason = ?report.stop_reason,
        samples = metrics.snapshot().samples,
        "Pipeline completed"
    );
    println!("{}", report.summary);

    Ok(())
}
