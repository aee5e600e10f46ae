//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::CollectorBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    source: SourceInfo,
    channels: Vec<ChannelInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sinks: Option<SinksInfo>,
    topology: TopologyInfo,
}

#[derive(Serialize)]
struct SourceInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    interval_ms: u64,
}

#[derive(Serialize)]
struct ChannelInfo {
    nickname: String,
    table: String,
    round_robin: bool,
    item_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    items: Vec<ItemInfo>,
}

#[derive(Serialize)]
struct ItemInfo {
    name: String,
    datatype: String,
    default: String,
}

#[derive(Serialize)]
struct SinksInfo {
    relational: RelationalInfo,
    round_robin: RoundRobinInfo,
    render: RenderInfo,
}

#[derive(Serialize)]
struct RelationalInfo {
    enabled: bool,
    path: String,
    retention_secs: i64,
    reference_table: String,
}

#[derive(Serialize)]
struct RoundRobinInfo {
    enabled: bool,
    path: String,
    step_secs: u64,
    warmup_steps: u64,
    archives: Vec<(u32, u32)>,
}

#[derive(Serialize)]
struct RenderInfo {
    enabled: bool,
    program: String,
    cadence_secs: u64,
    initial_delay_secs: u64,
}

#[derive(Serialize)]
struct TopologyInfo {
    heater_circuits: u32,
    controller_type: u32,
    solar_available: bool,
    render_args: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &CollectorBlueprint, args: &InfoArgs) -> ConfigInfo {
    let channels = blueprint
        .channels
        .iter()
        .map(|c| ChannelInfo {
            nickname: c.nickname.clone(),
            table: c.table.clone(),
            round_robin: c.round_robin,
            item_count: c.items.len(),
            items: if args.items {
                c.items
                    .iter()
                    .map(|i| ItemInfo {
                        name: i.name.clone(),
                        datatype: i.datatype.sql_type().to_string(),
                        default: i.default_value().to_string(),
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    let sinks = args.sinks.then(|| SinksInfo {
        relational: RelationalInfo {
            enabled: blueprint.relational.enabled,
            path: blueprint.relational.path.display().to_string(),
            retention_secs: blueprint.relational.retention_secs,
            reference_table: blueprint.relational.reference_table.clone(),
        },
        round_robin: RoundRobinInfo {
            enabled: blueprint.round_robin.enabled,
            path: blueprint.round_robin.path.display().to_string(),
            step_secs: blueprint.round_robin.step_secs,
            warmup_steps: blueprint.round_robin.warmup_steps,
            archives: blueprint
                .round_robin
                .archives
                .iter()
                .map(|a| (a.steps, a.rows))
                .collect(),
        },
        render: RenderInfo {
            enabled: blueprint.render.enabled,
            program: blueprint.render.program.clone(),
            cadence_secs: blueprint.render.cadence_secs,
            initial_delay_secs: blueprint.render.initial_delay_secs,
        },
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        source: SourceInfo {
            kind: format!("{:?}", blueprint.source.kind),
            path: blueprint
                .source
                .path
                .as_ref()
                .map(|p| p.display().to_string()),
            interval_ms: blueprint.source.interval_ms,
        },
        channels,
        sinks,
        topology: TopologyInfo {
            heater_circuits: blueprint.topology.heater_circuits,
            controller_type: blueprint.topology.controller_type,
            solar_available: blueprint.topology.solar_available,
            render_args: blueprint.render_request().to_args(),
        },
    }
}

fn print_config_info(blueprint: &CollectorBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Heating Telemetry Collector                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📥 Source");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Kind: {:?}", blueprint.source.kind);
    match &blueprint.source.path {
        Some(path) => println!("   └─ Capture: {}", path.display()),
        None => println!("   └─ Capture: (none)"),
    }

    println!("\n🔥 Channel groups ({})", blueprint.channels.len());
    for (i, channel) in blueprint.channels.iter().enumerate() {
        let is_last = i == blueprint.channels.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} -> {}{}",
            prefix,
            channel.nickname,
            channel.table,
            if channel.round_robin { " [rrd]" } else { "" }
        );

        if args.items && !channel.items.is_empty() {
            for (j, item) in channel.items.iter().enumerate() {
                let item_prefix = if j == channel.items.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {}  {} {} ({}, default {})",
                    child_prefix,
                    item_prefix,
                    item.name,
                    item.datatype.sql_type(),
                    item.default_value()
                );
            }
        } else {
            println!("   {}  └─ {} items", child_prefix, channel.items.len());
        }
    }

    if args.sinks {
        let relational = &blueprint.relational;
        println!("\n📤 Sinks");
        println!(
            "   ├─ SQLite: {} ({})",
            relational.path.display(),
            if relational.enabled { "on" } else { "off" }
        );
        if blueprint.retention_enabled() {
            println!(
                "   │  └─ Retention: {}s via '{}'",
                relational.retention_secs, relational.reference_table
            );
        }
        let rr = &blueprint.round_robin;
        println!(
            "   ├─ Round-robin: {} ({}, step {}s)",
            rr.path.display(),
            if rr.enabled { "on" } else { "off" },
            rr.step_secs
        );
        let render = &blueprint.render;
        if render.enabled {
            println!(
                "   └─ Render: {} every {}s",
                render.program, render.cadence_secs
            );
        } else {
            println!("   └─ Render: off");
        }
    }

    let topology = &blueprint.topology;
    println!("\n⚙️  Topology");
    println!("   ├─ Heater circuits: {}", topology.heater_circuits);
    println!("   ├─ Controller type: {}", topology.controller_type);
    println!("   └─ Solar: {}", topology.solar_available);

    println!();
}
