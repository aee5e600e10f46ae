//! Pipeline statistics.

use std::time::Duration;

use dispatcher::{EngineReport, StopReason};

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Engine report; `None` when the engine had to be aborted
    pub report: Option<EngineReport>,

    /// Engine aborted after the shutdown grace period
    pub aborted: bool,
}

impl PipelineStats {
    pub fn completed(duration: Duration, report: EngineReport) -> Self {
        Self {
            duration,
            report: Some(report),
            aborted: false,
        }
    }

    pub fn aborted(duration: Duration) -> Self {
        Self {
            duration,
            report: None,
            aborted: true,
        }
    }

    /// Samples per second
    pub fn throughput(&self) -> f64 {
        let samples = self.report.as_ref().map_or(0, |r| r.metrics.samples);
        if self.duration.as_secs_f64() > 0.0 {
            samples as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Collector Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());

        let Some(report) = &self.report else {
            println!("Engine aborted after shutdown grace period; no report available\n");
            return;
        };

        let m = &report.metrics;
        let reason = match report.stop_reason {
            StopReason::Signal => "stop signal",
            StopReason::SourceExhausted => "source exhausted",
        };
        println!("Stopped by: {reason}");
        println!("Throughput: {:.2} samples/s", self.throughput());
        println!(
            "Relational: {} inserts, {} errors",
            m.relational_inserts, m.relational_errors
        );
        println!(
            "Round-robin: {} updates, {} errors",
            m.round_robin_updates, m.round_robin_errors
        );
        println!("Render: {} runs, {} errors", m.renders, m.render_errors);
        println!(
            "Retention: {} sweeps, {} rows deleted",
            m.retention_sweeps, m.rows_deleted
        );
        println!("\n{}", report.summary);
    }
}
