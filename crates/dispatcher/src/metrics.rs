//! Engine metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one dispatch engine
///
/// Shared through `Arc` so a caller can watch a running engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    samples: AtomicU64,
    unrouted: AtomicU64,
    relational_inserts: AtomicU64,
    relational_errors: AtomicU64,
    round_robin_updates: AtomicU64,
    round_robin_errors: AtomicU64,
    renders: AtomicU64,
    render_errors: AtomicU64,
    retention_sweeps: AtomicU64,
    rows_deleted: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_samples(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_relational_inserts(&self) {
        self.relational_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_relational_errors(&self) {
        self.relational_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_round_robin_updates(&self) {
        self.round_robin_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_round_robin_errors(&self) {
        self.round_robin_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_renders(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_render_errors(&self) {
        self.render_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Account one sweep that actually deleted
    pub fn add_retention_sweep(&self, rows: usize) {
        self.retention_sweeps.fetch_add(1, Ordering::Relaxed);
        self.rows_deleted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples: self.samples.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            relational_inserts: self.relational_inserts.load(Ordering::Relaxed),
            relational_errors: self.relational_errors.load(Ordering::Relaxed),
            round_robin_updates: self.round_robin_updates.load(Ordering::Relaxed),
            round_robin_errors: self.round_robin_errors.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            retention_sweeps: self.retention_sweeps.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples: u64,
    pub unrouted: u64,
    pub relational_inserts: u64,
    pub relational_errors: u64,
    pub round_robin_updates: u64,
    pub round_robin_errors: u64,
    pub renders: u64,
    pub render_errors: u64,
    pub retention_sweeps: u64,
    pub rows_deleted: u64,
}
