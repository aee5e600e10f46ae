//! `provision` command implementation.
//!
//! Creates the SQLite tables and round-robin archives without starting the
//! engine. Existing tables and archives are left untouched.

use anyhow::{Context, Result};
use dispatcher::{open_relational, open_round_robin, RrdtoolStore};
use tracing::info;

use crate::cli::ProvisionArgs;
use crate::error::{ensure_config_exists, CliError};

/// Execute the `provision` command
pub async fn run_provision(args: &ProvisionArgs) -> Result<()> {
    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    args.overrides.apply(&mut blueprint);

    let mut relational = open_relational(&blueprint)
        .map_err(|e| CliError::sink_open("relational", e.to_string()))?;
    if relational.enabled() {
        info!(path = %relational.path().display(), "Relational tables ready");
        println!(
            "✓ SQLite: {} ({} tables)",
            relational.path().display(),
            blueprint.channels.len()
        );
    } else {
        println!("- SQLite: disabled");
    }
    relational
        .close()
        .map_err(|e| CliError::sink_open("relational", e.to_string()))?;

    let store = RrdtoolStore::new(&blueprint.round_robin.path);
    let mut round_robin = open_round_robin(&blueprint, store)
        .await
        .map_err(|e| CliError::sink_open("round-robin", e.to_string()))?;
    if round_robin.enabled() {
        let groups = round_robin.groups().join(", ");
        info!(dir = %blueprint.round_robin.path.display(), groups = %groups, "Round-robin archives ready");
        println!(
            "✓ Round-robin: {} [{}]",
            blueprint.round_robin.path.display(),
            groups
        );
    } else {
        println!("- Round-robin: disabled");
    }
    round_robin
        .close()
        .await
        .map_err(|e| CliError::sink_open("round-robin", e.to_string()))?;

    Ok(())
}
