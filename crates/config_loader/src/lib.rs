//! # Config Loader
//!
//! Reads the collector configuration (TOML, or JSON with a `.json`
//! extension), checks it against the validator rules and hands back an
//! immutable `CollectorBlueprint`. Nothing downstream re-reads the file.
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("collector.toml")).unwrap();
//! println!("Database: {}", blueprint.relational.path.display());
//! ```

mod parser;
mod validator;

pub use contracts::CollectorBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Entry point for loading and writing collector configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load, parse and validate a configuration file
    ///
    /// The format follows the extension (`.toml` / `.json`).
    pub fn load_from_path(path: &Path) -> Result<CollectorBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContractError::config_parse(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate configuration text
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CollectorBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Render a blueprint back to TOML (defaults made explicit)
    pub fn to_toml(blueprint: &CollectorBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("cannot write TOML: {e}")))
    }

    /// Render a blueprint as pretty JSON
    pub fn to_json(blueprint: &CollectorBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("cannot write JSON: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!(
                "unsupported config format '.{ext}' for {}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[source]
kind = "mock"
mock_count = 10

[relational]
path = "ht_database.db"
retention_secs = 2592000

[round_robin]
enabled = true
step_secs = 60

[[channels]]
nickname = "HG"
table = "heizgeraet"
[[channels.items]]
name = "T_vorlauf"
datatype = "real"
[[channels.items]]
name = "brenner"
datatype = "int"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.channels[0].nickname, "HG");
        assert_eq!(bp.channels[0].table, "heizgeraet");
        assert_eq!(bp.relational.retention_secs, 2_592_000);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.channels.len(), bp2.channels.len());
        assert_eq!(bp.channels[0].items.len(), bp2.channels[0].items.len());
        assert_eq!(bp.round_robin.step_secs, bp2.round_robin.step_secs);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.relational.path, bp2.relational.path);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // reference table defaults to "heizgeraet", which is missing here
        let content = r#"
[source]
kind = "mock"

[relational]
path = "ht.db"

[[channels]]
nickname = "WW"
table = "warmwasser"
[[channels.items]]
name = "T_ist"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("reference_table"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.toml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(MINIMAL_TOML.as_bytes())
            .unwrap();

        let bp = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(bp.channels[0].nickname, "HG");

        let bad = dir.path().join("collector.xml");
        std::fs::write(&bad, "<x/>").unwrap();
        let err = ConfigLoader::load_from_path(&bad).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
