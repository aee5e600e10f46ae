//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::CollectorBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    channel_count: usize,
    item_count: usize,
    relational_enabled: bool,
    round_robin_enabled: bool,
    render_enabled: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let item_count = blueprint.channels.iter().map(|c| c.items.len()).sum();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    channel_count: blueprint.channels.len(),
                    item_count,
                    relational_enabled: blueprint.relational.enabled,
                    round_robin_enabled: blueprint.round_robin.enabled,
                    render_enabled: blueprint.render.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CollectorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if !blueprint.relational.enabled && !blueprint.round_robin.enabled {
        warnings.push("Both sinks are disabled - samples will not be stored".to_string());
    }

    if blueprint.relational.enabled && !blueprint.retention_enabled() {
        warnings.push("relational.retention_secs <= 0 - the database grows unbounded".to_string());
    }

    if blueprint.round_robin.enabled && !blueprint.channels.iter().any(|c| c.round_robin) {
        warnings.push("Round-robin enabled but no channel group is flagged for it".to_string());
    }

    if blueprint.render.enabled {
        let program = std::path::Path::new(&blueprint.render.program);
        if program.components().count() > 1 && !program.exists() {
            warnings.push(format!(
                "Render program '{}' does not exist",
                blueprint.render.program
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Channel groups: {}", summary.channel_count);
            println!("  Items: {}", summary.item_count);
            println!("  Relational sink: {}", on_off(summary.relational_enabled));
            println!("  Round-robin sink: {}", on_off(summary.round_robin_enabled));
            println!("  Render: {}", on_off(summary.render_enabled));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
