//! Ingestion error types

use std::path::PathBuf;

use thiserror::Error;

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Capture file could not be opened
    #[error("failed to open capture '{}': {source}", .path.display())]
    OpenFailed {
        /// Capture path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source kind needs a setting that is missing
    #[error("source '{kind}' is missing '{field}'")]
    MissingSetting {
        /// Source kind
        kind: &'static str,
        /// Missing field
        field: &'static str,
    },

    /// Replay line could not be decoded
    #[error("line {line}: {message}")]
    ParseFailed {
        /// 1-based line number
        line: usize,
        /// Error message
        message: String,
    },
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
