//! MemoryRoundRobin - in-process round-robin store
//!
//! Keeps a fixed-capacity ring per archive tier. Each tier consolidates
//! `steps` primary updates into one averaged row. Clones share state, so a
//! test can keep one clone and inspect what the engine wrote.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, RoundRobinLayout, RoundRobinStore, Scalar};

/// One consolidated archive row
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRow {
    /// Timestamp of the last primary update folded into this row
    pub timestamp: i64,
    /// Average per item, `NaN` where no numeric value was seen
    pub values: Vec<f64>,
}

#[derive(Debug)]
struct Tier {
    steps: u32,
    rows: usize,
    ring: VecDeque<ArchiveRow>,
    pending: Vec<Vec<f64>>,
}

impl Tier {
    fn push(&mut self, timestamp: i64, values: Vec<f64>) {
        self.pending.push(values);
        if self.pending.len() < self.steps.max(1) as usize {
            return;
        }
        let width = self.pending[0].len();
        let averaged = (0..width)
            .map(|i| {
                let known: Vec<f64> = self
                    .pending
                    .iter()
                    .map(|row| row[i])
                    .filter(|v| !v.is_nan())
                    .collect();
                if known.is_empty() {
                    f64::NAN
                } else {
                    known.iter().sum::<f64>() / known.len() as f64
                }
            })
            .collect();
        self.pending.clear();

        if self.ring.len() == self.rows {
            self.ring.pop_front();
        }
        self.ring.push_back(ArchiveRow {
            timestamp,
            values: averaged,
        });
    }
}

#[derive(Debug)]
struct Archive {
    width: usize,
    last: Option<i64>,
    updates: u64,
    tiers: Vec<Tier>,
}

#[derive(Debug, Default)]
struct State {
    archives: HashMap<String, Archive>,
    closed: bool,
}

/// In-memory round-robin store
#[derive(Debug, Clone, Default)]
pub struct MemoryRoundRobin {
    state: Arc<Mutex<State>>,
}

impl MemoryRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted updates for `group`
    pub fn update_count(&self, group: &str) -> u64 {
        self.lock().archives.get(group).map_or(0, |a| a.updates)
    }

    /// Whether an archive exists for `group`
    pub fn contains(&self, group: &str) -> bool {
        self.lock().archives.contains_key(group)
    }

    /// Last accepted timestamp of `group`
    pub fn last_update(&self, group: &str) -> Option<i64> {
        self.lock().archives.get(group).and_then(|a| a.last)
    }

    /// Consolidated rows of one archive tier, oldest first
    pub fn rows(&self, group: &str, tier: usize) -> Vec<ArchiveRow> {
        self.lock()
            .archives
            .get(group)
            .and_then(|a| a.tiers.get(tier))
            .map(|t| t.ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RoundRobinStore for MemoryRoundRobin {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_if_absent(&mut self, layout: &RoundRobinLayout) -> Result<(), ContractError> {
        let mut state = self.lock();
        state
            .archives
            .entry(layout.group.clone())
            .or_insert_with(|| Archive {
                width: layout.items.len(),
                last: None,
                updates: 0,
                tiers: layout
                    .archives
                    .iter()
                    .map(|spec| Tier {
                        steps: spec.steps,
                        rows: spec.rows as usize,
                        ring: VecDeque::with_capacity(spec.rows as usize),
                        pending: Vec::new(),
                    })
                    .collect(),
            });
        Ok(())
    }

    async fn update(
        &mut self,
        group: &str,
        values: &[Scalar],
        timestamp: i64,
    ) -> Result<(), ContractError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ContractError::update(group, "store closed"));
        }
        let archive = state
            .archives
            .get_mut(group)
            .ok_or_else(|| ContractError::update(group, "no such archive"))?;

        if values.len() != archive.width {
            return Err(ContractError::update(
                group,
                format!("expected {} values, got {}", archive.width, values.len()),
            ));
        }
        if let Some(last) = archive.last {
            if timestamp < last {
                return Err(ContractError::update(
                    group,
                    format!("timestamp {timestamp} older than last update {last}"),
                ));
            }
        }

        let numeric: Vec<f64> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect();
        for tier in &mut archive.tiers {
            tier.push(timestamp, numeric.clone());
        }
        archive.last = Some(timestamp);
        archive.updates += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ArchiveSpec;

    fn layout() -> RoundRobinLayout {
        RoundRobinLayout {
            group: "heizgeraet".into(),
            items: vec!["T_vorlauf".into(), "status".into()],
            step_secs: 60,
            archives: vec![
                ArchiveSpec { steps: 1, rows: 3 },
                ArchiveSpec { steps: 2, rows: 2 },
            ],
        }
    }

    #[tokio::test]
    async fn test_ring_capacity_and_consolidation() {
        let mut store = MemoryRoundRobin::new();
        store.create_if_absent(&layout()).await.unwrap();

        for (i, t) in [60, 120, 180, 240, 300].into_iter().enumerate() {
            let values = [Scalar::Real(i as f64 * 2.0), Scalar::Text("on".into())];
            store.update("heizgeraet", &values, t).await.unwrap();
        }

        let fine = store.rows("heizgeraet", 0);
        assert_eq!(fine.len(), 3);
        assert_eq!(fine[0].timestamp, 180);
        assert_eq!(fine[2].values[0], 8.0);
        assert!(fine[2].values[1].is_nan());

        // (0+2)/2, (4+6)/2; the fifth update is still pending
        let coarse = store.rows("heizgeraet", 1);
        assert_eq!(coarse.len(), 2);
        assert_eq!(coarse[0].values[0], 1.0);
        assert_eq!(coarse[1].values[0], 5.0);
        assert_eq!(store.update_count("heizgeraet"), 5);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let mut store = MemoryRoundRobin::new();
        store.create_if_absent(&layout()).await.unwrap();
        store
            .update("heizgeraet", &[Scalar::Real(1.0), Scalar::Int(0)], 60)
            .await
            .unwrap();
        store.create_if_absent(&layout()).await.unwrap();
        assert_eq!(store.update_count("heizgeraet"), 1);
    }

    #[tokio::test]
    async fn test_rejects_older_timestamp() {
        let mut store = MemoryRoundRobin::new();
        store.create_if_absent(&layout()).await.unwrap();
        store
            .update("heizgeraet", &[Scalar::Real(1.0), Scalar::Int(0)], 120)
            .await
            .unwrap();
        let result = store
            .update("heizgeraet", &[Scalar::Real(1.0), Scalar::Int(0)], 60)
            .await;
        assert!(matches!(result, Err(ContractError::Update { .. })));
        assert_eq!(store.last_update("heizgeraet"), Some(120));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let mut store = MemoryRoundRobin::new();
        let observer = store.clone();
        store.create_if_absent(&layout()).await.unwrap();
        store.close().await.unwrap();
        assert!(observer.contains("heizgeraet"));
        assert!(observer.is_closed());
    }
}
