//! DispatchEngine - main loop routing samples to the sinks
//!
//! Each iteration pulls one sample, writes it to the relational sink, then
//! gives every cadenced activity (round-robin update, render, retention) a
//! chance to fire. The run signal is checked after routing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use contracts::{
    CollectorBlueprint, RenderRequest, RenderTrigger, RoundRobinStore, RunSignal, Sample,
    SampleSource, Scalar, RETENTION_CHECK_INTERVAL_SECS,
};
use observability::{DispatchAggregator, MetricsSummary};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::DispatcherError;
use crate::latest::LatestValues;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::render::NoRender;
use crate::retention::{RetentionPolicy, SweepOutcome};
use crate::schedule::SinkSchedule;
use crate::sinks::{MemoryRoundRobin, RoundRobinSink, SqliteSink, UpdateOutcome};

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The run signal was cleared
    Signal,
    /// The source reported end-of-stream
    SourceExhausted,
}

/// Final report of one engine run
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub stop_reason: StopReason,
    pub metrics: MetricsSnapshot,
    pub summary: MetricsSummary,
    pub relational_closed: bool,
    pub round_robin_closed: bool,
}

#[derive(Debug, Clone)]
struct Route {
    table: String,
    width: usize,
}

struct RoundRobinLane<S> {
    sink: RoundRobinSink<S>,
    groups: Vec<String>,
    schedule: SinkSchedule,
}

struct RenderLane<R> {
    renderer: R,
    request: RenderRequest,
    schedule: SinkSchedule,
}

struct RetentionLane {
    policy: RetentionPolicy,
    schedule: SinkSchedule,
}

/// Builder for creating a DispatchEngine
///
/// Starts without a round-robin sink or renderer; `round_robin()` and
/// `renderer()` swap them in. Lanes also require the matching enable flag in
/// the blueprint.
pub struct EngineBuilder<S = MemoryRoundRobin, R = NoRender> {
    blueprint: CollectorBlueprint,
    relational: SqliteSink,
    round_robin: Option<RoundRobinSink<S>>,
    renderer: Option<R>,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    pub fn new(blueprint: CollectorBlueprint, relational: SqliteSink) -> Self {
        Self {
            blueprint,
            relational,
            round_robin: None,
            renderer: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl<S, R> EngineBuilder<S, R>
where
    S: RoundRobinStore,
    R: RenderTrigger,
{
    /// Attach the round-robin sink
    pub fn round_robin<S2: RoundRobinStore>(self, sink: RoundRobinSink<S2>) -> EngineBuilder<S2, R> {
        EngineBuilder {
            blueprint: self.blueprint,
            relational: self.relational,
            round_robin: Some(sink),
            renderer: self.renderer,
            clock: self.clock,
        }
    }

    /// Attach the render trigger
    pub fn renderer<R2: RenderTrigger>(self, renderer: R2) -> EngineBuilder<S, R2> {
        EngineBuilder {
            blueprint: self.blueprint,
            relational: self.relational,
            round_robin: self.round_robin,
            renderer: Some(renderer),
            clock: self.clock,
        }
    }

    /// Replace the wall clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the engine; every schedule starts at the current clock reading
    #[instrument(name = "engine_builder_build", skip(self))]
    pub fn build(self) -> DispatchEngine<S, R> {
        let bp = self.blueprint;
        let start = self.clock.now();

        let routes = bp
            .channels
            .iter()
            .map(|c| {
                (
                    c.nickname.clone(),
                    Route {
                        table: c.table.clone(),
                        width: c.items.len(),
                    },
                )
            })
            .collect();

        let round_robin = self
            .round_robin
            .filter(|sink| bp.round_robin.enabled && sink.enabled())
            .map(|sink| {
                let step = Duration::from_secs(bp.round_robin.step_secs);
                let warmup = step.saturating_mul(
                    u32::try_from(bp.round_robin.warmup_steps).unwrap_or(u32::MAX),
                );
                RoundRobinLane {
                    groups: sink.groups().into_iter().map(str::to_string).collect(),
                    sink,
                    schedule: SinkSchedule::new(step, start, warmup),
                }
            });

        let render = self
            .renderer
            .filter(|_| bp.render.enabled)
            .map(|renderer| RenderLane {
                renderer,
                request: bp.render_request(),
                schedule: SinkSchedule::new(
                    Duration::from_secs(bp.render.cadence_secs),
                    start,
                    Duration::from_secs(bp.render.initial_delay_secs),
                ),
            });

        let retention = if self.relational.enabled() && bp.retention_enabled() {
            RetentionPolicy::new(
                bp.relational.retention_secs,
                bp.relational.reference_table.clone(),
                bp.tables().map(str::to_string).collect(),
            )
            .map(|policy| {
                let interval = Duration::from_secs(RETENTION_CHECK_INTERVAL_SECS);
                RetentionLane {
                    policy,
                    schedule: SinkSchedule::new(interval, start, interval),
                }
            })
        } else {
            None
        };

        info!(
            groups = bp.channels.len(),
            relational = self.relational.enabled(),
            round_robin = round_robin.is_some(),
            render = render.is_some(),
            retention = retention.is_some(),
            "Dispatch engine built"
        );

        DispatchEngine {
            routes,
            latest: LatestValues::from_channels(&bp.channels),
            relational: self.relational,
            round_robin,
            render,
            retention,
            clock: self.clock,
            metrics: Arc::new(EngineMetrics::new()),
            aggregator: DispatchAggregator::new(),
        }
    }
}

/// The dispatch engine
///
/// Owns both sinks, every schedule and the latest values for its whole
/// lifetime.
pub struct DispatchEngine<S = MemoryRoundRobin, R = NoRender> {
    routes: HashMap<String, Route>,
    latest: LatestValues,
    relational: SqliteSink,
    round_robin: Option<RoundRobinLane<S>>,
    render: Option<RenderLane<R>>,
    retention: Option<RetentionLane>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
    aggregator: DispatchAggregator,
}

impl<S, R> DispatchEngine<S, R>
where
    S: RoundRobinStore,
    R: RenderTrigger,
{
    /// Shared counters, readable while the engine runs
    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Next round-robin fire time, if that lane is active
    pub fn next_round_robin_at(&self) -> Option<DateTime<Utc>> {
        self.round_robin.as_ref().map(|l| l.schedule.next_fire_at())
    }

    /// Next render fire time, if that lane is active
    pub fn next_render_at(&self) -> Option<DateTime<Utc>> {
        self.render.as_ref().map(|l| l.schedule.next_fire_at())
    }

    /// Next retention check, if that lane is active
    pub fn next_retention_at(&self) -> Option<DateTime<Utc>> {
        self.retention.as_ref().map(|l| l.schedule.next_fire_at())
    }

    /// Run the main loop
    ///
    /// Returns when the source is exhausted or, after routing a sample, the
    /// run signal is found cleared. Both sinks are closed before returning.
    #[instrument(name = "engine_run", skip_all, fields(source = %source.name()))]
    pub async fn run<Src: SampleSource>(mut self, mut source: Src, signal: RunSignal) -> EngineReport {
        info!(routes = self.routes.len(), "Dispatch engine started");

        let stop_reason = loop {
            let Some(sample) = source.next_sample().await else {
                info!("Source exhausted");
                break StopReason::SourceExhausted;
            };

            self.route(sample).await;

            let samples = self.aggregator.samples;
            if samples.is_multiple_of(100) {
                debug!(samples, "Dispatch progress");
            }

            if !signal.is_running() {
                info!("Stop requested");
                break StopReason::Signal;
            }
        };

        self.shutdown(stop_reason).await
    }

    /// Spawn the engine as a background task
    pub fn spawn<Src>(self, source: Src, signal: RunSignal) -> JoinHandle<EngineReport>
    where
        Src: SampleSource + Send + 'static,
        S: Send + 'static,
        R: Send + 'static,
    {
        tokio::spawn(async move { self.run(source, signal).await })
    }

    async fn route(&mut self, sample: Sample) {
        let started = Instant::now();
        let now = self.clock.now();
        self.metrics.inc_samples();
        observability::record_sample_received(&sample.name);

        let routed = match self.routes.get(&sample.name).cloned() {
            Some(route) => {
                if sample.values.len() == route.width {
                    self.latest.update(&route.table, &sample.values);
                } else {
                    warn!(
                        group = %sample.name,
                        expected = route.width,
                        got = sample.values.len(),
                        "Sample width does not match channel group"
                    );
                }
                self.insert_relational(&route.table, &sample.values, now);
                true
            }
            None => {
                debug!(group = %sample.name, "No channel group for sample");
                self.metrics.inc_unrouted();
                observability::record_sample_unrouted(&sample.name);
                false
            }
        };

        self.tick_round_robin(now).await;
        self.tick_render(now).await;
        self.tick_retention(now);

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_dispatch_latency_ms(latency_ms);
        self.aggregator.observe(routed, latency_ms);
    }

    fn insert_relational(&mut self, table: &str, values: &[Scalar], now: DateTime<Utc>) {
        if !self.relational.enabled() {
            return;
        }
        let inserted = self.relational.insert(table, values, now);
        // ends the transaction even when the insert was rejected
        let committed = self.relational.commit();

        match inserted.and(committed) {
            Ok(()) => {
                self.metrics.inc_relational_inserts();
                observability::record_relational_insert(table, true);
            }
            Err(e) => {
                error!(table, error = %e, "Relational insert failed");
                self.metrics.inc_relational_errors();
                self.aggregator.relational_errors += 1;
                observability::record_relational_insert(table, false);
            }
        }
    }

    async fn tick_round_robin(&mut self, now: DateTime<Utc>) {
        let Some(lane) = self.round_robin.as_mut() else {
            return;
        };
        if !lane.schedule.fire_if_due(now) {
            return;
        }

        for group in &lane.groups {
            let Some(values) = self.latest.get(group) else {
                continue;
            };
            match lane.sink.update(group, values, now).await {
                Ok(UpdateOutcome::Applied) => {
                    self.metrics.inc_round_robin_updates();
                    observability::record_round_robin_update(group, true);
                }
                Ok(UpdateOutcome::Skipped) => {}
                Err(e) => {
                    error!(group, error = %e, "Round-robin update failed");
                    self.metrics.inc_round_robin_errors();
                    self.aggregator.round_robin_errors += 1;
                    observability::record_round_robin_update(group, false);
                }
            }
        }
    }

    async fn tick_render(&mut self, now: DateTime<Utc>) {
        let Some(lane) = self.render.as_mut() else {
            return;
        };
        if !lane.schedule.fire_if_due(now) {
            return;
        }

        match lane.renderer.render(&lane.request).await {
            Ok(()) => {
                self.metrics.inc_renders();
                observability::record_render(true);
            }
            Err(e) => {
                error!(error = %e, "Render failed");
                self.metrics.inc_render_errors();
                self.aggregator.render_errors += 1;
                observability::record_render(false);
            }
        }
    }

    fn tick_retention(&mut self, now: DateTime<Utc>) {
        let Some(lane) = self.retention.as_mut() else {
            return;
        };
        if !lane.schedule.fire_if_due(now) {
            return;
        }

        match lane.policy.sweep(&mut self.relational, now) {
            Ok(SweepOutcome::Swept { deleted, .. }) => {
                self.metrics.add_retention_sweep(deleted);
                observability::record_retention_sweep(deleted);
            }
            Ok(SweepOutcome::Kept { .. }) => {}
            Err(e) => error!(error = %e, "Retention sweep failed"),
        }
    }

    async fn shutdown(mut self, stop_reason: StopReason) -> EngineReport {
        if let Err(e) = self.relational.close() {
            error!(sink = %self.relational.name(), error = %e, "Relational close failed");
        }
        let relational_closed = !self.relational.is_connected();

        let round_robin_closed = match self.round_robin.as_mut() {
            Some(lane) => {
                if let Err(e) = lane.sink.close().await {
                    error!(store = %lane.sink.name(), error = %e, "Round-robin close failed");
                }
                lane.sink.is_closed()
            }
            None => true,
        };

        let metrics = self.metrics.snapshot();
        info!(
            reason = ?stop_reason,
            samples = metrics.samples,
            inserts = metrics.relational_inserts,
            updates = metrics.round_robin_updates,
            "Dispatch engine stopped"
        );

        EngineReport {
            stop_reason,
            metrics,
            summary: self.aggregator.summary(),
            relational_closed,
            round_robin_closed,
        }
    }
}

/// Open and provision the relational sink configured in `blueprint`
///
/// Returns a disabled sink when the blueprint turns it off.
#[instrument(name = "engine_open_relational", skip(blueprint), fields(path = %blueprint.relational.path.display()))]
pub fn open_relational(blueprint: &CollectorBlueprint) -> Result<SqliteSink, DispatcherError> {
    if !blueprint.relational.enabled {
        return Ok(SqliteSink::disabled());
    }
    let mut sink = SqliteSink::open(&blueprint.relational.path)
        .map_err(|e| DispatcherError::open("sqlite", e))?;
    sink.provision(&blueprint.channels)
        .map_err(|e| DispatcherError::provision("sqlite", e))?;
    Ok(sink)
}

/// Wrap `store` in a round-robin sink and create its archives
///
/// The sink is disabled (and nothing is created) when the blueprint turns
/// round-robin off.
#[instrument(name = "engine_open_round_robin", skip(blueprint, store), fields(store = %store.name()))]
pub async fn open_round_robin<S: RoundRobinStore>(
    blueprint: &CollectorBlueprint,
    store: S,
) -> Result<RoundRobinSink<S>, DispatcherError> {
    let mut sink = RoundRobinSink::new(store, blueprint.round_robin_layouts());
    if !blueprint.round_robin.enabled {
        sink.set_enabled(false);
        return Ok(sink);
    }
    let name = sink.name().to_string();
    sink.provision()
        .await
        .map_err(|e| DispatcherError::provision(name, e))?;
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sinks::local_timestamp;
    use contracts::{ChannelConfig, ItemConfig, ItemType, RelationalConfig, RoundRobinConfig};
    use ingestion::MockSampleSource;
    use std::collections::VecDeque;
    use std::path::Path;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn blueprint(db: &Path) -> CollectorBlueprint {
        CollectorBlueprint {
            version: Default::default(),
            source: Default::default(),
            relational: RelationalConfig {
                enabled: true,
                path: db.to_path_buf(),
                retention_secs: 0,
                reference_table: "t1".into(),
            },
            round_robin: RoundRobinConfig {
                enabled: true,
                step_secs: 0,
                warmup_steps: 0,
                ..Default::default()
            },
            render: Default::default(),
            topology: Default::default(),
            channels: vec![ChannelConfig {
                nickname: "T1".into(),
                table: "t1".into(),
                round_robin: true,
                items: vec![ItemConfig {
                    name: "wert".into(),
                    datatype: ItemType::Int,
                    default: None,
                }],
            }],
        }
    }

    /// Source that moves a shared manual clock before yielding each sample
    struct TimedSource {
        clock: ManualClock,
        script: VecDeque<(i64, Sample)>,
    }

    impl TimedSource {
        fn new(clock: &ManualClock, script: Vec<(i64, Sample)>) -> Self {
            Self {
                clock: clock.clone(),
                script: script.into(),
            }
        }
    }

    impl SampleSource for TimedSource {
        fn name(&self) -> &str {
            "timed"
        }

        async fn next_sample(&mut self) -> Option<Sample> {
            let (secs, sample) = self.script.pop_front()?;
            self.clock.set(at(secs));
            Some(sample)
        }
    }

    /// Renderer that records its calls and fails on demand
    #[derive(Clone, Default)]
    struct RecordingRenderer {
        calls: Arc<std::sync::Mutex<Vec<RenderRequest>>>,
        fail: bool,
    }

    impl RenderTrigger for RecordingRenderer {
        async fn render(&mut self, request: &RenderRequest) -> Result<(), contracts::ContractError> {
            self.calls.lock().unwrap().push(request.clone());
            if self.fail {
                Err(contracts::ContractError::render("draw.sh", "exit status 1"))
            } else {
                Ok(())
            }
        }
    }

    /// Round-robin store that accepts layouts but rejects every update
    struct RejectingStore;

    impl RoundRobinStore for RejectingStore {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn create_if_absent(
            &mut self,
            _layout: &contracts::RoundRobinLayout,
        ) -> Result<(), contracts::ContractError> {
            Ok(())
        }

        async fn update(
            &mut self,
            group: &str,
            _values: &[Scalar],
            _timestamp: i64,
        ) -> Result<(), contracts::ContractError> {
            Err(contracts::ContractError::update(group, "archive is read-only"))
        }

        async fn close(&mut self) -> Result<(), contracts::ContractError> {
            Ok(())
        }
    }

    async fn engine(
        bp: &CollectorBlueprint,
        store: MemoryRoundRobin,
        clock: Arc<dyn Clock>,
    ) -> DispatchEngine<MemoryRoundRobin, NoRender> {
        let relational = open_relational(bp).unwrap();
        let round_robin = open_round_robin(bp, store).await.unwrap();
        EngineBuilder::new(bp.clone(), relational)
            .round_robin(round_robin)
            .clock(clock)
            .build()
    }

    #[tokio::test]
    async fn test_end_to_end_two_samples() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let store = MemoryRoundRobin::new();
        let observer = store.clone();

        let engine = engine(&bp, store, Arc::new(SystemClock)).await;
        let source = MockSampleSource::scripted(
            "script",
            vec![Sample::scalar("T1", 10), Sample::scalar("T1", 20)],
        );
        let report = engine.run(source, RunSignal::new()).await;

        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.metrics.relational_inserts, 2);
        assert_eq!(report.metrics.round_robin_updates, 2);
        assert!(report.relational_closed);
        assert!(report.round_robin_closed);
        assert!(observer.is_closed());
        assert_eq!(observer.update_count("t1"), 2);

        let mut db = SqliteSink::open(&bp.relational.path).unwrap();
        let values: Vec<Scalar> = db
            .fetch_rows("t1")
            .unwrap()
            .into_iter()
            .flat_map(|r| r.values)
            .collect();
        assert_eq!(values, vec![Scalar::Int(10), Scalar::Int(20)]);
    }

    #[tokio::test]
    async fn test_row_carries_insertion_instant() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(SystemClock)).await;

        let before = Utc::now();
        let source = MockSampleSource::scripted("script", vec![Sample::scalar("T1", 1)]);
        engine.run(source, RunSignal::new()).await;
        let after = Utc::now();

        let mut db = SqliteSink::open(&bp.relational.path).unwrap();
        let rows = db.fetch_rows("t1").unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(row.utc >= before.timestamp() - 1 && row.utc <= after.timestamp() + 1);

        let instant = DateTime::from_timestamp(row.utc, 0).unwrap();
        assert_eq!(row.local_timestamp, local_timestamp(instant));
    }

    #[tokio::test]
    async fn test_cadence_gates_round_robin() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(&dir.path().join("ht.db"));
        bp.round_robin.step_secs = 5;
        let store = MemoryRoundRobin::new();
        let observer = store.clone();
        let clock = ManualClock::at_epoch(1_000);

        let engine = engine(&bp, store, Arc::new(clock.clone())).await;
        // 100 samples spread over the same second
        let script = (0..100).map(|i| (1_000, Sample::scalar("T1", i))).collect();
        let report = engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;

        assert_eq!(report.metrics.samples, 100);
        assert_eq!(report.metrics.relational_inserts, 100);
        assert_eq!(observer.update_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_warmup_delays_first_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(&dir.path().join("ht.db"));
        bp.round_robin.step_secs = 60;
        bp.round_robin.warmup_steps = 3;
        let store = MemoryRoundRobin::new();
        let observer = store.clone();
        let clock = ManualClock::at_epoch(0);

        let engine = engine(&bp, store, Arc::new(clock.clone())).await;
        assert_eq!(engine.next_round_robin_at(), Some(at(180)));

        let script = vec![
            (60, Sample::scalar("T1", 1)),
            (179, Sample::scalar("T1", 2)),
            (180, Sample::scalar("T1", 3)),
        ];
        engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;

        assert_eq!(observer.update_count("t1"), 1);
        assert_eq!(observer.last_update("t1"), Some(180));
        assert_eq!(observer.rows("t1", 0)[0].values, vec![3.0]);
    }

    #[tokio::test]
    async fn test_stall_fires_once_then_resets() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(&dir.path().join("ht.db"));
        bp.round_robin.step_secs = 10;
        let store = MemoryRoundRobin::new();
        let observer = store.clone();
        let clock = ManualClock::at_epoch(0);

        let engine = engine(&bp, store, Arc::new(clock.clone())).await;
        let script = vec![
            (0, Sample::scalar("T1", 1)),
            // stalled for five cadences
            (55, Sample::scalar("T1", 2)),
            (64, Sample::scalar("T1", 3)),
            (65, Sample::scalar("T1", 4)),
        ];
        engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;

        assert_eq!(observer.update_count("t1"), 3);
        let stamps: Vec<i64> = observer.rows("t1", 0).iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![0, 55, 65]);
    }

    #[tokio::test]
    async fn test_unrouted_sample_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(SystemClock)).await;

        let source = MockSampleSource::scripted(
            "script",
            vec![Sample::scalar("XX", 1), Sample::scalar("T1", 2)],
        );
        let report = engine.run(source, RunSignal::new()).await;

        assert_eq!(report.metrics.samples, 2);
        assert_eq!(report.metrics.unrouted, 1);
        assert_eq!(report.metrics.relational_inserts, 1);
        assert_eq!(report.summary.unrouted, 1);
    }

    #[tokio::test]
    async fn test_stop_signal_returns_after_next_sample() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(SystemClock)).await;

        let signal = RunSignal::new();
        signal.stop();
        let source = MockSampleSource::scripted(
            "script",
            (0..5).map(|i| Sample::scalar("T1", i)).collect(),
        );
        let report = engine.run(source, signal).await;

        assert_eq!(report.stop_reason, StopReason::Signal);
        assert_eq!(report.metrics.samples, 1);
        assert!(report.relational_closed);
    }

    #[tokio::test]
    async fn test_exhausted_source_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(SystemClock)).await;

        let report = engine
            .run(MockSampleSource::scripted("empty", vec![]), RunSignal::new())
            .await;
        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.metrics.samples, 0);
        assert!(report.round_robin_closed);
    }

    #[tokio::test]
    async fn test_disabled_relational_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(&dir.path().join("ht.db"));
        bp.relational.enabled = false;
        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(SystemClock)).await;
        assert!(engine.next_retention_at().is_none());

        let source = MockSampleSource::scripted("script", vec![Sample::scalar("T1", 1)]);
        let report = engine.run(source, RunSignal::new()).await;

        assert_eq!(report.metrics.relational_inserts, 0);
        assert_eq!(report.metrics.relational_errors, 0);
        assert!(!bp.relational.path.exists());
    }

    #[tokio::test]
    async fn test_render_failure_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(&dir.path().join("ht.db"));
        bp.render.enabled = true;
        bp.render.program = "draw.sh".into();
        bp.render.cadence_secs = 10;
        bp.render.initial_delay_secs = 0;
        let clock = ManualClock::at_epoch(0);

        let renderer = RecordingRenderer {
            fail: true,
            ..Default::default()
        };
        let calls = Arc::clone(&renderer.calls);

        let engine = EngineBuilder::new(bp.clone(), open_relational(&bp).unwrap())
            .renderer(renderer)
            .clock(Arc::new(clock.clone()))
            .build();
        let script = vec![
            (0, Sample::scalar("T1", 1)),
            (5, Sample::scalar("T1", 2)),
            (10, Sample::scalar("T1", 3)),
        ];
        let report = engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;

        assert_eq!(report.metrics.samples, 3);
        assert_eq!(report.metrics.render_errors, 2);
        assert_eq!(report.metrics.relational_inserts, 3);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], bp.render_request());
    }

    #[tokio::test]
    async fn test_round_robin_failure_keeps_relational_flowing() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let clock = ManualClock::at_epoch(0);

        let round_robin = open_round_robin(&bp, RejectingStore).await.unwrap();
        let engine = EngineBuilder::new(bp.clone(), open_relational(&bp).unwrap())
            .round_robin(round_robin)
            .clock(Arc::new(clock.clone()))
            .build();
        let script = (0..3).map(|i| (i, Sample::scalar("T1", i))).collect();
        let report = engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;

        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.metrics.samples, 3);
        assert_eq!(report.metrics.round_robin_errors, 3);
        assert_eq!(report.metrics.round_robin_updates, 0);
        assert_eq!(report.summary.round_robin_errors, 3);
        assert_eq!(report.metrics.relational_inserts, 3);
        assert_eq!(report.metrics.relational_errors, 0);

        let mut db = SqliteSink::open(&bp.relational.path).unwrap();
        assert_eq!(db.count_rows("t1").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rejected_insert_keeps_round_robin_flowing() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let store = MemoryRoundRobin::new();
        let observer = store.clone();
        let clock = ManualClock::at_epoch(0);

        let engine = engine(&bp, store, Arc::new(clock.clone())).await;
        // two-value samples do not fit the one-column group
        let script = vec![
            (0, Sample::new("T1", vec![Scalar::Int(1), Scalar::Int(2)])),
            (1, Sample::scalar("T1", 5)),
            (2, Sample::new("T1", vec![Scalar::Int(3), Scalar::Int(4)])),
        ];
        let report = engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;

        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.metrics.samples, 3);
        assert_eq!(report.metrics.relational_errors, 2);
        assert_eq!(report.summary.relational_errors, 2);
        assert_eq!(report.metrics.relational_inserts, 1);
        assert_eq!(report.metrics.round_robin_updates, 3);
        assert_eq!(report.metrics.round_robin_errors, 0);

        assert_eq!(observer.update_count("t1"), 3);
        assert_eq!(observer.last_update("t1"), Some(2));
        let values: Vec<f64> = observer
            .rows("t1", 0)
            .into_iter()
            .flat_map(|r| r.values)
            .collect();
        assert_eq!(values, vec![0.0, 5.0, 5.0]);

        let mut db = SqliteSink::open(&bp.relational.path).unwrap();
        let rows = db.fetch_rows("t1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Scalar::Int(5)]);
    }

    #[tokio::test]
    async fn test_retention_sweep_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = blueprint(&dir.path().join("ht.db"));
        bp.relational.retention_secs = 100;
        bp.round_robin.enabled = false;
        let clock = ManualClock::at_epoch(1_000);

        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(clock.clone())).await;
        assert_eq!(
            engine.next_retention_at(),
            Some(at(1_000 + RETENTION_CHECK_INTERVAL_SECS as i64))
        );

        let script = vec![
            (1_000, Sample::scalar("T1", 1)),
            (1_050, Sample::scalar("T1", 2)),
            // first check at 1120: limit 1020 removes the row from 1000
            (1_120, Sample::scalar("T1", 3)),
            // not due again until 1240
            (1_200, Sample::scalar("T1", 4)),
        ];
        let report = engine.run(TimedSource::new(&clock, script), RunSignal::new()).await;
        assert_eq!(report.metrics.retention_sweeps, 1);
        assert_eq!(report.metrics.rows_deleted, 1);

        let mut db = SqliteSink::open(&bp.relational.path).unwrap();
        let utcs: Vec<i64> = db.fetch_rows("t1").unwrap().iter().map(|r| r.utc).collect();
        assert_eq!(utcs, vec![1_050, 1_120, 1_200]);
    }

    #[tokio::test]
    async fn test_spawned_engine_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(&dir.path().join("ht.db"));
        let engine = engine(&bp, MemoryRoundRobin::new(), Arc::new(SystemClock)).await;
        let metrics = engine.metrics();

        let (tx, source) = ingestion::ChannelSource::channel("decoder", 8);
        let signal = RunSignal::new();
        let handle = engine.spawn(source, signal.clone());

        tx.send(Sample::scalar("T1", 1)).await.unwrap();
        signal.stop();
        tx.send(Sample::scalar("T1", 2)).await.unwrap();

        let report = handle.await.unwrap();
        assert_eq!(report.stop_reason, StopReason::Signal);
        assert!(report.metrics.samples >= 1 && report.metrics.samples <= 2);
        assert_eq!(metrics.snapshot().samples, report.metrics.samples);
    }
}
