//! Dispatch metrics
//!
//! Prometheus recorders for the dispatch loop plus an in-process aggregator
//! for the end-of-run summary.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Register HELP text and units for every collector metric
///
/// Called once after the exporter is installed.
pub fn describe_metrics() {
    describe_counter!("ht_collector_samples_total", "Samples pulled from the source");
    describe_counter!(
        "ht_collector_samples_unrouted_total",
        "Samples whose nickname matches no channel group"
    );
    describe_counter!(
        "ht_collector_relational_inserts_total",
        "Rows committed to the relational store"
    );
    describe_counter!(
        "ht_collector_relational_errors_total",
        "Relational inserts rejected or not committed"
    );
    describe_counter!(
        "ht_collector_round_robin_updates_total",
        "Round-robin archive updates applied"
    );
    describe_counter!(
        "ht_collector_round_robin_errors_total",
        "Round-robin archive updates that failed"
    );
    describe_counter!("ht_collector_render_runs_total", "Successful render script runs");
    describe_counter!("ht_collector_render_errors_total", "Failed render script runs");
    describe_counter!(
        "ht_collector_retention_sweeps_total",
        "Retention checks that deleted rows"
    );
    describe_counter!(
        "ht_collector_retention_rows_deleted_total",
        "Rows deleted by retention sweeps"
    );
    describe_counter!(
        "ht_collector_source_lines_skipped_total",
        "Malformed capture lines skipped by the replay source"
    );
    describe_gauge!(
        "ht_collector_oldest_entry_age_secs",
        Unit::Seconds,
        "Age of the oldest row in the reference table at the last check"
    );
    describe_histogram!(
        "ht_collector_dispatch_latency_ms",
        Unit::Milliseconds,
        "Time to route one sample including cadence ticks"
    );
}

/// Record a sample taken from the source
pub fn record_sample_received(group: &str) {
    counter!(
        "ht_collector_samples_total",
        "group" => group.to_string()
    )
    .increment(1);
}

/// Record a sample whose nickname matches no configured group
pub fn record_sample_unrouted(group: &str) {
    counter!(
        "ht_collector_samples_unrouted_total",
        "group" => group.to_string()
    )
    .increment(1);
}

/// Record one relational insert attempt
pub fn record_relational_insert(table: &str, success: bool) {
    if success {
        counter!(
            "ht_collector_relational_inserts_total",
            "table" => table.to_string()
        )
        .increment(1);
    } else {
        counter!(
            "ht_collector_relational_errors_total",
            "table" => table.to_string()
        )
        .increment(1);
    }
}

/// Record one round-robin update attempt
pub fn record_round_robin_update(group: &str, success: bool) {
    let name = if success {
        "ht_collector_round_robin_updates_total"
    } else {
        "ht_collector_round_robin_errors_total"
    };
    counter!(name, "group" => group.to_string()).increment(1);
}

/// Record one render invocation
pub fn record_render(success: bool) {
    if success {
        counter!("ht_collector_render_runs_total").increment(1);
    } else {
        counter!("ht_collector_render_errors_total").increment(1);
    }
}

/// Record a retention sweep that deleted `rows` rows
pub fn record_retention_sweep(rows: usize) {
    counter!("ht_collector_retention_sweeps_total").increment(1);
    counter!("ht_collector_retention_rows_deleted_total").increment(rows as u64);
}

/// Age of the oldest relational entry seen by the last retention check
pub fn record_oldest_entry_age_secs(age_secs: i64) {
    gauge!("ht_collector_oldest_entry_age_secs").set(age_secs as f64);
}

/// Time spent routing one sample, cadence ticks included
pub fn record_dispatch_latency_ms(latency_ms: f64) {
    histogram!("ht_collector_dispatch_latency_ms").record(latency_ms);
}

/// Dispatch metrics aggregator
///
/// Aggregates in memory for the summary printed when a run ends.
#[derive(Debug, Clone, Default)]
pub struct DispatchAggregator {
    pub samples: u64,
    pub unrouted: u64,
    pub relational_errors: u64,
    pub round_robin_errors: u64,
    pub render_errors: u64,

    /// Per-sample routing latency (ms)
    pub latency_stats: RunningStats,
}

impl DispatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one routed sample
    pub fn observe(&mut self, routed: bool, latency_ms: f64) {
        self.samples += 1;
        if !routed {
            self.unrouted += 1;
        }
        self.latency_stats.push(latency_ms);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            samples: self.samples,
            unrouted: self.unrouted,
            relational_errors: self.relational_errors,
            round_robin_errors: self.round_robin_errors,
            render_errors: self.render_errors,
            unrouted_rate: if self.samples > 0 {
                self.unrouted as f64 / self.samples as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub samples: u64,
    pub unrouted: u64,
    pub relational_errors: u64,
    pub round_robin_errors: u64,
    pub render_errors: u64,
    pub unrouted_rate: f64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Samples: {}", self.samples)?;
        writeln!(
            f,
            "Unrouted samples: {} ({:.2}%)",
            self.unrouted, self.unrouted_rate
        )?;
        writeln!(f, "Relational errors: {}", self.relational_errors)?;
        writeln!(f, "Round-robin errors: {}", self.round_robin_errors)?;
        writeln!(f, "Render errors: {}", self.render_errors)?;
        writeln!(f, "Dispatch latency (ms): {}", self.latency_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
