//! Retention sweep over the relational sink
//!
//! The oldest `UTC` of the reference table decides whether anything is
//! expired. If it is, rows older than `now - window` are deleted from every
//! monitored table and the database is vacuumed.

use chrono::{DateTime, Utc};
use contracts::ContractError;
use tracing::{debug, error, info, instrument};

use crate::sinks::SqliteSink;

/// Outcome of one retention check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Nothing older than the limit
    Kept { oldest: i64, time_limit: i64 },
    /// Expired rows deleted
    Swept { time_limit: i64, deleted: usize },
}

/// Retention policy of the relational store
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    window_secs: i64,
    reference_table: String,
    tables: Vec<String>,
}

impl RetentionPolicy {
    /// `None` when `window_secs <= 0` (sweep disabled)
    pub fn new(
        window_secs: i64,
        reference_table: impl Into<String>,
        tables: Vec<String>,
    ) -> Option<Self> {
        (window_secs > 0).then(|| Self {
            window_secs,
            reference_table: reference_table.into(),
            tables,
        })
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Run one check at `now`
    #[instrument(name = "retention_sweep", skip(self, sink, now), fields(window = self.window_secs))]
    pub fn sweep(
        &self,
        sink: &mut SqliteSink,
        now: DateTime<Utc>,
    ) -> Result<SweepOutcome, ContractError> {
        let now_epoch = now.timestamp();
        let time_limit = now_epoch.saturating_sub(self.window_secs);

        let oldest = match sink.oldest_timestamp(&self.reference_table) {
            Ok(Some(oldest)) => oldest,
            Ok(None) => now_epoch,
            Err(e) => {
                error!(table = %self.reference_table, error = %e, "Oldest entry lookup failed");
                now_epoch
            }
        };
        observability::record_oldest_entry_age_secs(now_epoch.saturating_sub(oldest));

        if oldest >= time_limit {
            debug!(oldest, time_limit, "Nothing expired");
            return Ok(SweepOutcome::Kept { oldest, time_limit });
        }

        let mut deleted = 0;
        for table in &self.tables {
            deleted += sink.delete_older_than(table, time_limit)?;
        }
        sink.vacuum()?;

        info!(time_limit, deleted, "Retention sweep completed");
        Ok(SweepOutcome::Swept {
            time_limit,
            deleted,
        })
    }
}
