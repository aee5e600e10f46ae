//! RoundRobinSink - cadence-fed writer in front of a `RoundRobinStore`

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use contracts::{ContractError, RoundRobinLayout, RoundRobinStore, Scalar};
use tracing::{debug, info, instrument, warn};

/// Result of one sink update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Written to the store
    Applied,
    /// Dropped: sink disabled or timestamp older than the last update
    Skipped,
}

/// Round-robin sink
///
/// Knows the layout of every group it writes and the last accepted timestamp
/// per group. A timestamp older than the last one is skipped with a warning;
/// the store never sees it.
pub struct RoundRobinSink<S> {
    store: S,
    layouts: HashMap<String, RoundRobinLayout>,
    last_update: HashMap<String, i64>,
    enabled: bool,
    closed: bool,
}

impl<S: RoundRobinStore> RoundRobinSink<S> {
    pub fn new(store: S, layouts: Vec<RoundRobinLayout>) -> Self {
        Self {
            store,
            layouts: layouts
                .into_iter()
                .map(|l| (l.group.clone(), l))
                .collect(),
            last_update: HashMap::new(),
            enabled: true,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Groups written by this sink, sorted
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self.layouts.keys().map(String::as_str).collect();
        groups.sort_unstable();
        groups
    }

    /// Create every archive that does not exist yet
    #[instrument(name = "round_robin_provision", skip(self), fields(store = %self.store.name()))]
    pub async fn provision(&mut self) -> Result<(), ContractError> {
        if !self.enabled {
            return Ok(());
        }
        for group in self.groups().into_iter().map(str::to_string).collect::<Vec<_>>() {
            if let Some(layout) = self.layouts.get(&group) {
                self.store.create_if_absent(layout).await?;
            }
        }
        info!(archives = self.layouts.len(), "Round-robin archives ready");
        Ok(())
    }

    /// Write one row for `group` at `timestamp`
    ///
    /// # Errors
    /// `ContractError::Update` for an unknown group, a row whose width does
    /// not match the layout, or a write rejected by the store.
    pub async fn update(
        &mut self,
        group: &str,
        values: &[Scalar],
        timestamp: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ContractError> {
        if !self.enabled {
            return Ok(UpdateOutcome::Skipped);
        }

        let layout = self
            .layouts
            .get(group)
            .ok_or_else(|| ContractError::update(group, "unknown group"))?;
        if layout.items.len() != values.len() {
            return Err(ContractError::update(
                group,
                format!("expected {} values, got {}", layout.items.len(), values.len()),
            ));
        }

        let epoch = timestamp.timestamp();
        if let Some(&last) = self.last_update.get(group) {
            if epoch < last {
                warn!(group, epoch, last, "Skipping out-of-order round-robin update");
                return Ok(UpdateOutcome::Skipped);
            }
        }

        self.store.update(group, values, epoch).await?;
        self.last_update.insert(group.to_string(), epoch);
        debug!(group, epoch, "Round-robin updated");
        Ok(UpdateOutcome::Applied)
    }

    /// Close the underlying store (idempotent)
    pub async fn close(&mut self) -> Result<(), ContractError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.store.close().await
    }
}
