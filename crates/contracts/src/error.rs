//! Layered error definitions
//!
//! Categorized by source: config / sink / round-robin / render

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sink Errors =====
    /// Sink could not be opened
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Sink used while not connected
    #[error("sink '{sink_name}' is not connected")]
    SinkUnavailable { sink_name: String },

    /// Statement rejected by the relational store
    #[error("query on table '{table}' failed: {message}")]
    Query { table: String, message: String },

    /// Round-robin store rejected an update
    #[error("round-robin update for '{group}' failed: {message}")]
    Update { group: String, message: String },

    // ===== Render Errors =====
    /// External render invocation failed
    #[error("render '{program}' failed: {message}")]
    Render { program: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink unavailable error
    pub fn sink_unavailable(sink_name: impl Into<String>) -> Self {
        Self::SinkUnavailable {
            sink_name: sink_name.into(),
        }
    }

    /// Create query error
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create round-robin update error
    pub fn update(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Update {
            group: group.into(),
            message: message.into(),
        }
    }

    /// Create render error
    pub fn render(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Startup-only failures that must abort the process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } | Self::SinkConnection { .. }
        )
    }
}
