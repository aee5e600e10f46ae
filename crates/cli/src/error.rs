//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A sink could not be opened or provisioned
    #[error("Failed to open {sink} sink: {message}")]
    SinkOpen { sink: String, message: String },

    /// The engine task ended abnormally
    #[error("Engine execution failed: {message}")]
    EngineExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn sink_open(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkOpen {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn engine_execution(message: impl Into<String>) -> Self {
        Self::EngineExecution {
            message: message.into(),
        }
    }
}

/// Fail with `ConfigNotFound` unless `path` exists
pub fn ensure_config_exists(path: &std::path::Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path.display().to_string()))
    }
}
