//! Configuration parsing
//!
//! Deserialises the raw text only; defaults come from the serde attributes on
//! the blueprint types and semantic checks live in `validator`.

use contracts::{CollectorBlueprint, ContractError};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format for a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// Deserialise a blueprint from `content`
pub fn parse(content: &str, format: ConfigFormat) -> Result<CollectorBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(format, e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(format, e)),
    }
}

fn parse_error<E>(format: ConfigFormat, err: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ContractError::ConfigParse {
        message: format!("{} parse error: {err}", format.label()),
        source: Some(Box::new(err)),
    }
}
