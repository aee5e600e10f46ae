//! CollectorBlueprint - Config Loader output
//!
//! Describes the complete collector configuration: sample source, both sinks,
//! rendering, hardware topology and the monitored channel groups.
//! Immutable once loaded; handed to the engine at construction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ArchiveSpec, RenderRequest, RenderTopology, RoundRobinLayout, Scalar};

/// Fixed check interval of the retention sweep (seconds)
pub const RETENTION_CHECK_INTERVAL_SECS: u64 = 120;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete collector blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Sample source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Relational sink (SQLite)
    pub relational: RelationalConfig,

    /// Round-robin sink
    #[serde(default)]
    pub round_robin: RoundRobinConfig,

    /// Render trigger
    #[serde(default)]
    pub render: RenderConfig,

    /// Hardware topology forwarded to the renderer
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Monitored channel groups
    pub channels: Vec<ChannelConfig>,
}

/// Sample source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Text capture replayed line by line
    #[default]
    Replay,
    /// Synthetic samples built from item defaults
    Mock,
}

/// Sample source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Capture file (replay only)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Delay between replayed samples in milliseconds
    #[serde(default)]
    pub interval_ms: u64,

    /// Number of synthetic samples (mock only, 0 = unlimited)
    #[serde(default)]
    pub mock_count: u64,
}

/// Relational sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite database file
    pub path: PathBuf,

    /// Retention window in seconds (<= 0 disables the sweep)
    #[serde(default)]
    pub retention_secs: i64,

    /// Table whose oldest UTC drives the sweep decision
    #[serde(default = "default_reference_table")]
    pub reference_table: String,
}

/// Round-robin sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRobinConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory of the archives
    #[serde(default = "default_rrd_path")]
    pub path: PathBuf,

    /// Update cadence and archive step in seconds
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,

    /// Steps to wait before the first update
    #[serde(default = "default_warmup_steps")]
    pub warmup_steps: u64,

    /// Resolution tiers
    #[serde(default = "default_archives")]
    pub archives: Vec<ArchiveConfig>,
}

impl Default for RoundRobinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_rrd_path(),
            step_secs: default_step_secs(),
            warmup_steps: default_warmup_steps(),
            archives: default_archives(),
        }
    }
}

/// One archive tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub steps: u32,
    pub rows: u32,
}

/// Render trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Script or executable to run
    #[serde(default)]
    pub program: String,

    /// Output directory handed to the script
    #[serde(default = "default_render_output")]
    pub output_path: PathBuf,

    /// Seconds between renders
    #[serde(default = "default_render_cadence")]
    pub cadence_secs: u64,

    /// Seconds before the first render
    #[serde(default = "default_render_delay")]
    pub initial_delay_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: String::new(),
            output_path: default_render_output(),
            cadence_secs: default_render_cadence(),
            initial_delay_secs: default_render_delay(),
        }
    }
}

/// Heating-system hardware topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default = "default_heater_circuits")]
    pub heater_circuits: u32,
    #[serde(default)]
    pub controller_type: u32,
    #[serde(default)]
    pub mixer_flags: Vec<bool>,
    #[serde(default)]
    pub hydraulic_switch_sensor: bool,
    #[serde(default)]
    pub solar_available: bool,
    #[serde(default)]
    pub second_solar_collector: bool,
    #[serde(default)]
    pub second_solar_buffer: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            heater_circuits: default_heater_circuits(),
            controller_type: 0,
            mixer_flags: Vec::new(),
            hydraulic_switch_sensor: false,
            solar_available: false,
            second_solar_collector: false,
            second_solar_buffer: false,
        }
    }
}

/// Channel group: one table / one archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Short name produced by the decoder (e.g. "HG")
    pub nickname: String,

    /// Long name used as table and archive name (e.g. "heizgeraet")
    pub table: String,

    /// Whether this group is written to the round-robin store
    #[serde(default = "default_true")]
    pub round_robin: bool,

    /// Ordered data items (one column each)
    pub items: Vec<ItemConfig>,
}

/// Declared column type of a data item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Int,
    #[default]
    Real,
    Text,
}

impl ItemType {
    /// SQLite column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            ItemType::Int => "INTEGER",
            ItemType::Real => "REAL",
            ItemType::Text => "TEXT",
        }
    }
}

/// One data item of a channel group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemConfig {
    pub name: String,

    #[serde(default)]
    pub datatype: ItemType,

    /// Value used until the first sample arrives
    #[serde(default)]
    pub default: Option<Scalar>,
}

impl ItemConfig {
    /// Configured default, or the zero value of the declared type
    pub fn default_value(&self) -> Scalar {
        self.default.clone().unwrap_or(match self.datatype {
            ItemType::Int => Scalar::Int(0),
            ItemType::Real => Scalar::Real(0.0),
            ItemType::Text => Scalar::Text(String::new()),
        })
    }
}

impl CollectorBlueprint {
    /// All monitored table names, in configuration order
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.table.as_str())
    }

    /// Round-robin archive layouts for every group flagged for it
    pub fn round_robin_layouts(&self) -> Vec<RoundRobinLayout> {
        let archives: Vec<ArchiveSpec> = self
            .round_robin
            .archives
            .iter()
            .map(|a| ArchiveSpec {
                steps: a.steps,
                rows: a.rows,
            })
            .collect();

        self.channels
            .iter()
            .filter(|c| c.round_robin)
            .map(|c| RoundRobinLayout {
                group: c.table.clone(),
                items: c.items.iter().map(|i| i.name.clone()).collect(),
                step_secs: self.round_robin.step_secs,
                archives: archives.clone(),
            })
            .collect()
    }

    /// Fixed parameter set of the render trigger
    pub fn render_request(&self) -> RenderRequest {
        let topology = &self.topology;
        RenderRequest {
            storage_path: self.round_robin.path.clone(),
            output_path: self.render.output_path.clone(),
            topology: RenderTopology {
                heater_circuits: topology.heater_circuits,
                controller_type: topology.controller_type,
                mixer_flags: topology.mixer_flags.clone(),
                hydraulic_switch_sensor: topology.hydraulic_switch_sensor,
                solar_available: topology.solar_available,
                second_solar: topology.second_solar_collector || topology.second_solar_buffer,
            },
        }
    }

    /// Whether the retention sweep runs at all
    pub fn retention_enabled(&self) -> bool {
        self.relational.enabled && self.relational.retention_secs > 0
    }
}

/// Identifier usable as a table or column name: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn default_true() -> bool {
    true
}

fn default_reference_table() -> String {
    "heizgeraet".to_string()
}

fn default_rrd_path() -> PathBuf {
    PathBuf::from("./rrd")
}

fn default_step_secs() -> u64 {
    60
}

fn default_warmup_steps() -> u64 {
    3
}

fn default_archives() -> Vec<ArchiveConfig> {
    vec![
        // 2 days at step resolution
        ArchiveConfig {
            steps: 1,
            rows: 2880,
        },
        // 31 days at 30-step resolution
        ArchiveConfig {
            steps: 30,
            rows: 1488,
        },
    ]
}

fn default_render_output() -> PathBuf {
    PathBuf::from("./html")
}

fn default_render_cadence() -> u64 {
    600
}

fn default_render_delay() -> u64 {
    240
}

fn default_heater_circuits() -> u32 {
    1
}
