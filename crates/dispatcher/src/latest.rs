//! Latest value per channel group
//!
//! Round-robin updates carry the most recent row of every group, so the
//! engine keeps the last seen row here, seeded from item defaults.

use std::collections::HashMap;

use contracts::{ChannelConfig, Scalar};

#[derive(Debug, Clone, Default)]
pub struct LatestValues {
    rows: HashMap<String, Vec<Scalar>>,
}

impl LatestValues {
    /// Seed every group with its item defaults
    pub fn from_channels(channels: &[ChannelConfig]) -> Self {
        let rows = channels
            .iter()
            .map(|c| {
                (
                    c.table.clone(),
                    c.items.iter().map(|i| i.default_value()).collect(),
                )
            })
            .collect();
        Self { rows }
    }

    /// Replace the row of `table`
    pub fn update(&mut self, table: &str, values: &[Scalar]) {
        self.rows.insert(table.to_string(), values.to_vec());
    }

    pub fn get(&self, table: &str) -> Option<&[Scalar]> {
        self.rows.get(table).map(Vec::as_slice)
    }
}
