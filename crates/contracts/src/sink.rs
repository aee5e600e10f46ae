//! Round-robin store and render trigger traits - Dispatcher output interfaces
//!
//! The relational sink is a concrete SQLite adapter inside the dispatcher;
//! the round-robin engine and the render script are external collaborators
//! reached through these traits.

use std::path::PathBuf;

use crate::{ContractError, Scalar};

/// Archive tier of a round-robin store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSpec {
    /// Primary steps consolidated into one archive row
    pub steps: u32,
    /// Rows kept before the oldest is overwritten
    pub rows: u32,
}

/// Layout of one round-robin archive (one per channel group)
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRobinLayout {
    /// Channel group stored in this archive
    pub group: String,
    /// Ordered data source names (one per item)
    pub items: Vec<String>,
    /// Primary step in seconds
    pub step_secs: u64,
    /// Resolution tiers
    pub archives: Vec<ArchiveSpec>,
}

/// Longest data source name a round-robin archive accepts
pub const MAX_DS_NAME: usize = 19;

/// Data source name for an item: identifier characters only, at most
/// `MAX_DS_NAME` long
pub fn ds_name(item: &str) -> String {
    item.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(MAX_DS_NAME)
        .collect()
}

/// Fixed-horizon time-series store trait
///
/// All implementations must tolerate being asked to create an archive that
/// already exists.
#[trait_variant::make(RoundRobinStore: Send)]
pub trait LocalRoundRobinStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Create the archive if it does not exist yet
    async fn create_if_absent(&mut self, layout: &RoundRobinLayout) -> Result<(), ContractError>;

    /// Append one aggregate sample at `timestamp` (UTC epoch seconds)
    ///
    /// # Errors
    /// `ContractError::Update` if the group is unknown or the write is rejected
    async fn update(
        &mut self,
        group: &str,
        values: &[Scalar],
        timestamp: i64,
    ) -> Result<(), ContractError>;

    /// Release the store
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Hardware topology forwarded verbatim to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderTopology {
    pub heater_circuits: u32,
    pub controller_type: u32,
    pub mixer_flags: Vec<bool>,
    pub hydraulic_switch_sensor: bool,
    pub solar_available: bool,
    pub second_solar: bool,
}

/// Parameters of one render invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Directory holding the round-robin archives
    pub storage_path: PathBuf,
    /// Directory receiving the rendered output
    pub output_path: PathBuf,
    pub topology: RenderTopology,
}

impl RenderRequest {
    /// Positional argument list:
    /// storage, output, circuits, controller, mixers, hydraulic switch, solar, second solar
    pub fn to_args(&self) -> Vec<String> {
        let flag = |b: bool| u8::from(b).to_string();
        let mixers = self
            .topology
            .mixer_flags
            .iter()
            .map(|m| flag(*m))
            .collect::<Vec<_>>()
            .join(",");

        vec![
            self.storage_path.display().to_string(),
            self.output_path.display().to_string(),
            self.topology.heater_circuits.to_string(),
            self.topology.controller_type.to_string(),
            mixers,
            flag(self.topology.hydraulic_switch_sensor),
            flag(self.topology.solar_available),
            flag(self.topology.second_solar),
        ]
    }
}

/// External rendering invocation
#[trait_variant::make(RenderTrigger: Send)]
pub trait LocalRenderTrigger {
    /// Run one render; a non-zero exit must come back as `ContractError::Render`
    async fn render(&mut self, request: &RenderRequest) -> Result<(), ContractError>;
}
