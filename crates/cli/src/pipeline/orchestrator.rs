//! Pipeline orchestrator - opens the source and sinks, runs the engine and
//! handles shutdown.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{CollectorBlueprint, RoundRobinStore, RunSignal};
use dispatcher::{
    open_relational, open_round_robin, EngineBuilder, MemoryRoundRobin, RrdtoolStore,
    ScriptRenderer, SqliteSink,
};
use ingestion::ConfiguredSource;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The collector blueprint, CLI overrides applied
    pub blueprint: CollectorBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Use the in-memory round-robin store
    pub memory_round_robin: bool,

    /// Wait after a stop request before aborting the engine
    pub shutdown_grace: Duration,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source ends, or until `shutdown` resolves and the
    /// engine stops (or the grace period runs out)
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // startup failures are fatal
        let source = ingestion::open_source(blueprint)
            .await
            .context("Failed to open sample source")?;

        let relational = open_relational(blueprint)
            .map_err(|e| CliError::sink_open("relational", e.to_string()))?;

        if self.config.memory_round_robin {
            info!("Round-robin data kept in memory");
            self.run_with_store(MemoryRoundRobin::new(), source, relational, shutdown, start_time)
                .await
        } else {
            let store = RrdtoolStore::new(&blueprint.round_robin.path);
            self.run_with_store(store, source, relational, shutdown, start_time)
                .await
        }
    }

    async fn run_with_store<S>(
        &self,
        store: S,
        source: ConfiguredSource,
        relational: SqliteSink,
        shutdown: impl Future<Output = ()>,
        start_time: Instant,
    ) -> Result<PipelineStats>
    where
        S: RoundRobinStore + Send + 'static,
    {
        let blueprint = &self.config.blueprint;

        let round_robin = open_round_robin(blueprint, store)
            .await
            .map_err(|e| CliError::sink_open("round-robin", e.to_string()))?;

        let engine = EngineBuilder::new(blueprint.clone(), relational)
            .round_robin(round_robin)
            .renderer(ScriptRenderer::new(blueprint.render.program.clone()))
            .build();

        let signal = RunSignal::new();
        let mut handle = engine.spawn(source, signal.clone());

        info!("Engine running");

        tokio::pin!(shutdown);
        tokio::select! {
            joined = &mut handle => {
                let report = joined.map_err(|e| CliError::engine_execution(e.to_string()))?;
                return Ok(PipelineStats::completed(start_time.elapsed(), report));
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping engine...");
                signal.stop();
            }
        }

        // the engine only notices the stop after its next sample
        match tokio::time::timeout(self.config.shutdown_grace, &mut handle).await {
            Ok(joined) => {
                let report = joined.map_err(|e| CliError::engine_execution(e.to_string()))?;
                Ok(PipelineStats::completed(start_time.elapsed(), report))
            }
            Err(_) => {
                warn!(
                    grace_secs = self.config.shutdown_grace.as_secs(),
                    "Engine did not stop in time, aborting"
                );
                handle.abort();
                Ok(PipelineStats::aborted(start_time.elapsed()))
            }
        }
    }
}
