//! Configuration validation
//!
//! Rules:
//! - channel nicknames and table names are unique
//! - table and item names are plain SQL identifiers
//! - every channel group has at least one item
//! - the retention reference table is a configured table
//! - round-robin step and archives are usable when enabled
//! - data source names stay distinct after truncation in archived groups
//! - render program is set when rendering is enabled
//! - replay sources name a capture file

use std::collections::HashSet;

use contracts::{
    ds_name, is_valid_identifier, CollectorBlueprint, ContractError, SourceKind, MAX_DS_NAME,
};

/// Validate a CollectorBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    validate_channels(blueprint)?;
    validate_items(blueprint)?;
    validate_relational(blueprint)?;
    validate_round_robin(blueprint)?;
    validate_render(blueprint)?;
    validate_source(blueprint)?;
    Ok(())
}

/// Nickname / table uniqueness and identifier rules
fn validate_channels(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    if blueprint.channels.is_empty() {
        return Err(ContractError::config_validation(
            "channels",
            "at least one channel group is required",
        ));
    }

    let mut nicknames = HashSet::new();
    let mut tables = HashSet::new();
    for channel in &blueprint.channels {
        if !nicknames.insert(&channel.nickname) {
            return Err(ContractError::config_validation(
                format!("channels[nickname={}]", channel.nickname),
                "duplicate nickname",
            ));
        }
        if !is_valid_identifier(&channel.table) {
            return Err(ContractError::config_validation(
                format!("channels[{}].table", channel.nickname),
                format!("'{}' is not a valid table name", channel.table),
            ));
        }
        if !tables.insert(channel.table.to_lowercase()) {
            return Err(ContractError::config_validation(
                format!("channels[{}].table", channel.nickname),
                format!("duplicate table '{}'", channel.table),
            ));
        }
    }
    Ok(())
}

/// Item lists are non-empty, names valid and unique per group
fn validate_items(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    for channel in &blueprint.channels {
        if channel.items.is_empty() {
            return Err(ContractError::config_validation(
                format!("channels[{}].items", channel.nickname),
                "channel group has no items",
            ));
        }

        let mut seen = HashSet::new();
        for item in &channel.items {
            if !is_valid_identifier(&item.name) {
                return Err(ContractError::config_validation(
                    format!("channels[{}].items[{}]", channel.nickname, item.name),
                    "item name is not a valid column name",
                ));
            }
            // LocalTimestamp / UTC are the leading columns of every table
            let lowered = item.name.to_lowercase();
            if lowered == "utc" || lowered == "localtimestamp" || !seen.insert(lowered) {
                return Err(ContractError::config_validation(
                    format!("channels[{}].items[{}]", channel.nickname, item.name),
                    "duplicate column name",
                ));
            }
        }
    }
    Ok(())
}

fn validate_relational(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let relational = &blueprint.relational;
    if !relational.enabled {
        return Ok(());
    }

    if relational.path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "relational.path",
            "database path cannot be empty",
        ));
    }

    if !blueprint.tables().any(|t| t == relational.reference_table) {
        return Err(ContractError::config_validation(
            "relational.reference_table",
            format!(
                "reference_table '{}' not found in any channel group",
                relational.reference_table
            ),
        ));
    }
    Ok(())
}

fn validate_round_robin(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let rr = &blueprint.round_robin;
    if !rr.enabled {
        return Ok(());
    }

    if rr.step_secs == 0 {
        return Err(ContractError::config_validation(
            "round_robin.step_secs",
            "step_secs must be > 0",
        ));
    }

    if rr.archives.is_empty() {
        return Err(ContractError::config_validation(
            "round_robin.archives",
            "at least one archive is required",
        ));
    }

    for (idx, archive) in rr.archives.iter().enumerate() {
        if archive.steps == 0 || archive.rows == 0 {
            return Err(ContractError::config_validation(
                format!("round_robin.archives[{}]", idx),
                format!(
                    "steps and rows must be > 0, got steps={} rows={}",
                    archive.steps, archive.rows
                ),
            ));
        }
    }

    for channel in blueprint.channels.iter().filter(|c| c.round_robin) {
        let mut names = HashSet::new();
        for item in &channel.items {
            let name = ds_name(&item.name);
            if !names.insert(name.clone()) {
                return Err(ContractError::config_validation(
                    format!("channels[{}].items[{}]", channel.nickname, item.name),
                    format!(
                        "data source name '{name}' is not unique in the first {MAX_DS_NAME} characters"
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn validate_render(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let render = &blueprint.render;
    if !render.enabled {
        return Ok(());
    }

    if render.program.trim().is_empty() {
        return Err(ContractError::config_validation(
            "render.program",
            "render program cannot be empty",
        ));
    }
    if !blueprint.round_robin.enabled {
        return Err(ContractError::config_validation(
            "render.enabled",
            "rendering requires the round-robin sink",
        ));
    }
    Ok(())
}

fn validate_source(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    if blueprint.source.kind == SourceKind::Replay && blueprint.source.path.is_none() {
        return Err(ContractError::config_validation(
            "source.path",
            "replay source requires a capture path",
        ));
    }
    Ok(())
}
