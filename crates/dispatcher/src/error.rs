//! Startup errors of the dispatch engine
//!
//! Steady-state sink failures never leave the engine; they are logged and
//! counted. Only opening and provisioning a sink can fail the caller.

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The sink's backing store could not be opened
    #[error("cannot open {name} sink: {source}")]
    Open {
        name: String,
        #[source]
        source: ContractError,
    },

    /// Tables or archives could not be created
    #[error("cannot provision {name} sink: {source}")]
    Provision {
        name: String,
        #[source]
        source: ContractError,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DispatcherError {
    pub fn open(name: impl Into<String>, source: ContractError) -> Self {
        Self::Open {
            name: name.into(),
            source,
        }
    }

    pub fn provision(name: impl Into<String>, source: ContractError) -> Self {
        Self::Provision {
            name: name.into(),
            source,
        }
    }

    /// Name of the sink that failed, if known
    pub fn sink_name(&self) -> Option<&str> {
        match self {
            Self::Open { name, .. } | Self::Provision { name, .. } => Some(name),
            Self::Contract(_) => None,
        }
    }
}
