//! # Ingestion
//!
//! Sample sources feeding the dispatch engine.
//!
//! Responsibilities:
//! - Replay decoded captures (`ReplaySource`)
//! - Accept samples from an external decoder task (`ChannelSource`)
//! - Produce synthetic or scripted samples (`MockSampleSource`)
//! - Build the configured source from a `CollectorBlueprint`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::open_source;
//! use contracts::SampleSource;
//!
//! let mut source = open_source(&blueprint).await?;
//! while let Some(sample) = source.next_sample().await {
//!     // route sample
//! }
//! ```

mod channel;
mod error;
mod mock;
mod replay;

use std::time::Duration;

use contracts::{CollectorBlueprint, Sample, SampleSource, SourceKind};
use tracing::info;

// Re-exports
pub use channel::ChannelSource;
pub use error::{IngestionError, Result};
pub use mock::{MockSampleSource, MockSourceConfig};
pub use replay::{parse_line, ReplaySource};

/// Source selected by configuration
pub enum ConfiguredSource {
    Replay(ReplaySource),
    Mock(MockSampleSource),
}

impl SampleSource for ConfiguredSource {
    fn name(&self) -> &str {
        match self {
            ConfiguredSource::Replay(s) => s.name(),
            ConfiguredSource::Mock(s) => s.name(),
        }
    }

    async fn next_sample(&mut self) -> Option<Sample> {
        match self {
            ConfiguredSource::Replay(s) => s.next_sample().await,
            ConfiguredSource::Mock(s) => s.next_sample().await,
        }
    }
}

/// Open the source described by `blueprint.source`
pub async fn open_source(blueprint: &CollectorBlueprint) -> Result<ConfiguredSource> {
    let config = &blueprint.source;
    let interval = Duration::from_millis(config.interval_ms);

    match config.kind {
        SourceKind::Replay => {
            let path = config.path.as_deref().ok_or(IngestionError::MissingSetting {
                kind: "replay",
                field: "path",
            })?;
            info!(path = %path.display(), "Opening replay source");
            Ok(ConfiguredSource::Replay(
                ReplaySource::open(path, interval).await?,
            ))
        }
        SourceKind::Mock => {
            info!(count = config.mock_count, "Opening mock source");
            Ok(ConfiguredSource::Mock(MockSampleSource::from_blueprint(
                blueprint,
                MockSourceConfig {
                    count: config.mock_count,
                    interval,
                },
            )))
        }
    }
}
