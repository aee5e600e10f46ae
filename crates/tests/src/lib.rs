//! # Integration Tests
//!
//! End-to-end tests across the collector crates.
//!
//! Covers:
//! - configuration -> source -> dispatch engine -> both sinks
//! - cadence gating and retention under a manual clock
//! - stopping a running engine through the run signal

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::RETENTION_CHECK_INTERVAL_SECS, 120);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CollectorBlueprint, RunSignal, Sample, SampleSource, Scalar};
    use dispatcher::{
        open_relational, open_round_robin, EngineBuilder, ManualClock, MemoryRoundRobin,
        SqliteSink, StopReason,
    };
    use ingestion::ChannelSource;

    const T0: i64 = 1_700_000_000;

    /// Source wrapper that advances a manual clock before every sample
    struct ClockedSource<S> {
        inner: S,
        clock: ManualClock,
        step: Duration,
    }

    impl<S: SampleSource> SampleSource for ClockedSource<S> {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn next_sample(&mut self) -> Option<Sample> {
            self.clock.advance(self.step);
            self.inner.next_sample().await
        }
    }

    fn load(config: &str) -> CollectorBlueprint {
        ConfigLoader::load_from_str(config, ConfigFormat::Toml).expect("valid config")
    }

    fn replay_config(capture: &Path, db: &Path) -> String {
        format!(
            r#"
[source]
kind = "replay"
path = "{}"

[relational]
path = "{}"

[round_robin]
enabled = true
step_secs = 60
warmup_steps = 1

[[channels]]
nickname = "HG"
table = "heizgeraet"
[[channels.items]]
name = "T_vorlauf"
datatype = "real"
[[channels.items]]
name = "Brenner"
datatype = "int"

[[channels]]
nickname = "WW"
table = "warmwasser"
round_robin = false
[[channels.items]]
name = "T_speicher"
datatype = "real"
"#,
            capture.display(),
            db.display()
        )
    }

    /// Replay capture -> DispatchEngine -> SQLite + in-memory round-robin
    ///
    /// Verifies the complete data flow:
    /// 1. The replay source decodes the capture, skipping comments
    /// 2. Every routed sample becomes one relational row stamped with the clock
    /// 3. Round-robin updates follow the step cadence after the warmup
    #[tokio::test]
    async fn test_e2e_replay_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("capture.txt");
        let db = dir.path().join("ht.db");
        std::fs::write(
            &capture,
            "# captured from the boiler bus\nHG 45.5 1\nWW 51.0\nHG 46.0 1\nWW 50.5\nHG 46.5 0\nWW 50.0\n",
        )
        .unwrap();

        let blueprint = load(&replay_config(&capture, &db));
        let source = ingestion::open_source(&blueprint).await.unwrap();

        let clock = ManualClock::at_epoch(T0);
        let store = MemoryRoundRobin::new();
        let relational = open_relational(&blueprint).unwrap();
        let round_robin = open_round_robin(&blueprint, store.clone()).await.unwrap();
        let engine = EngineBuilder::new(blueprint, relational)
            .round_robin(round_robin)
            .clock(Arc::new(clock.clone()))
            .build();

        // samples arrive at T0+30, T0+60, ..., T0+180
        let source = ClockedSource {
            inner: source,
            clock,
            step: Duration::from_secs(30),
        };
        let report = engine.run(source, RunSignal::new()).await;

        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.metrics.samples, 6);
        assert_eq!(report.metrics.relational_inserts, 6);
        assert!(report.relational_closed);
        assert!(report.round_robin_closed);

        // fires at T0+60, T0+120 and T0+180; warmwasser is not archived
        assert_eq!(store.update_count("heizgeraet"), 3);
        assert_eq!(store.last_update("heizgeraet"), Some(T0 + 180));
        assert!(!store.contains("warmwasser"));
        assert_eq!(report.metrics.round_robin_updates, 3);

        let mut sink = SqliteSink::open(&db).unwrap();
        let rows = sink.fetch_rows("heizgeraet").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].utc, T0 + 30);
        assert_eq!(rows[0].values, vec![Scalar::Real(45.5), Scalar::Int(1)]);
        assert_eq!(rows[2].values, vec![Scalar::Real(46.5), Scalar::Int(0)]);
        assert_eq!(sink.count_rows("warmwasser").unwrap(), 3);
    }

    /// Retention keeps only the configured window of the reference table
    #[tokio::test]
    async fn test_retention_trims_relational_history() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ht.db");
        let blueprint = load(&format!(
            r#"
[source]
kind = "mock"
mock_count = 11

[relational]
path = "{}"
retention_secs = 300
reference_table = "heizgeraet"

[[channels]]
nickname = "HG"
table = "heizgeraet"
[[channels.items]]
name = "T_vorlauf"
default = 40.0
"#,
            db.display()
        ));

        let source = ingestion::MockSampleSource::from_blueprint(
            &blueprint,
            ingestion::MockSourceConfig {
                count: 11,
                interval: Duration::ZERO,
            },
        );

        // clock starts one step early so the first sample lands on T0
        let clock = ManualClock::at_epoch(T0 - 60);
        let relational = open_relational(&blueprint).unwrap();
        let engine = EngineBuilder::new(blueprint, relational)
            .clock(Arc::new(clock.clone()))
            .build();
        assert_eq!(
            engine.next_retention_at().map(|t| t.timestamp()),
            Some(T0 - 60 + 120)
        );

        // samples at T0, T0+60, ..., T0+600
        let source = ClockedSource {
            inner: source,
            clock,
            step: Duration::from_secs(60),
        };
        let report = engine.run(source, RunSignal::new()).await;

        assert_eq!(report.metrics.relational_inserts, 11);
        // checks at T0+60, +180, +300, +420, +540; only the last two delete
        assert_eq!(report.metrics.retention_sweeps, 2);

        let mut sink = SqliteSink::open(&db).unwrap();
        let rows = sink.fetch_rows("heizgeraet").unwrap();
        assert_eq!(rows.len() as u64, 11 - report.metrics.rows_deleted);
        assert_eq!(rows.last().unwrap().utc, T0 + 600);
        assert_eq!(report.metrics.rows_deleted, 4);
        assert_eq!(rows[0].utc, T0 + 240);
    }

    /// Stopping the run signal ends a spawned engine after its next sample
    #[tokio::test]
    async fn test_spawned_engine_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ht.db");
        let blueprint = load(&format!(
            r#"
[source]
kind = "mock"

[relational]
path = "{}"

[[channels]]
nickname = "HG"
table = "heizgeraet"
[[channels.items]]
name = "T_vorlauf"
"#,
            db.display()
        ));

        let relational = open_relational(&blueprint).unwrap();
        let engine = EngineBuilder::new(blueprint, relational).build();
        let metrics = engine.metrics();

        let (tx, source) = ChannelSource::channel("decoder", 8);
        let signal = RunSignal::new();
        let handle = engine.spawn(source, signal.clone());

        tx.send(Sample::scalar("HG", 41.0)).await.unwrap();
        tx.send(Sample::scalar("XX", 1)).await.unwrap();
        assert!(signal.stop());
        // the engine may already have stopped and dropped the receiver
        let _ = tx.send(Sample::scalar("HG", 42.0)).await;

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("engine stopped in time")
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::Signal);
        assert!(report.metrics.samples >= 1);
        assert_eq!(report.metrics, metrics.snapshot());
        assert!(report.relational_closed);
    }
}
