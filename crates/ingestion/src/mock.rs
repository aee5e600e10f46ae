//! Mock sample sources
//!
//! For tests and runs without an acquisition channel.

use std::collections::VecDeque;
use std::time::Duration;

use contracts::{CollectorBlueprint, Sample, SampleSource, Scalar};
use tracing::trace;

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// Samples to produce (0 = unlimited)
    pub count: u64,

    /// Delay before every sample
    pub interval: Duration,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            count: 100,
            interval: Duration::from_millis(100),
        }
    }
}

enum Script {
    /// Fixed list, then end-of-stream
    Fixed(VecDeque<Sample>),
    /// Rows derived from channel defaults, cycling through the groups
    Synthetic {
        rows: Vec<Sample>,
        produced: u64,
        count: u64,
    },
}

/// Mock sample source
pub struct MockSampleSource {
    name: String,
    script: Script,
    interval: Duration,
}

impl MockSampleSource {
    /// Yield `samples` in order, then end-of-stream
    pub fn scripted(name: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            name: name.into(),
            script: Script::Fixed(samples.into()),
            interval: Duration::ZERO,
        }
    }

    /// Generate rows for every configured channel group from item defaults
    ///
    /// Real-valued items drift slightly per round so round-robin graphs are
    /// not flat.
    pub fn from_blueprint(blueprint: &CollectorBlueprint, config: MockSourceConfig) -> Self {
        let rows = blueprint
            .channels
            .iter()
            .map(|channel| {
                Sample::new(
                    channel.nickname.clone(),
                    channel.items.iter().map(|i| i.default_value()).collect(),
                )
            })
            .collect();

        Self {
            name: "mock".to_string(),
            script: Script::Synthetic {
                rows,
                produced: 0,
                count: config.count,
            },
            interval: config.interval,
        }
    }

    /// Set the delay before every sample
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn produce(&mut self) -> Option<Sample> {
        match &mut self.script {
            Script::Fixed(queue) => queue.pop_front(),
            Script::Synthetic {
                rows,
                produced,
                count,
            } => {
                if rows.is_empty() || (*count > 0 && *produced >= *count) {
                    return None;
                }
                let idx = (*produced % rows.len() as u64) as usize;
                let round = *produced / rows.len() as u64;
                *produced += 1;

                let mut sample = rows[idx].clone();
                for value in &mut sample.values {
                    if let Scalar::Real(v) = value {
                        *v += (round % 10) as f64 * 0.1;
                    }
                }
                Some(sample)
            }
        }
    }
}

impl SampleSource for MockSampleSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Option<Sample> {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        let sample = self.produce();
        trace!(source = %self.name, sample = ?sample, "Mock sample");
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelConfig, ItemConfig, ItemType, RelationalConfig};

    fn blueprint() -> CollectorBlueprint {
        CollectorBlueprint {
            version: Default::default(),
            source: Default::default(),
            relational: RelationalConfig {
                enabled: true,
                path: "ht.db".into(),
                retention_secs: 0,
                reference_table: "heizgeraet".into(),
            },
            round_robin: Default::default(),
            render: Default::default(),
            topology: Default::default(),
            channels: vec![
                ChannelConfig {
                    nickname: "HG".into(),
                    table: "heizgeraet".into(),
                    round_robin: true,
                    items: vec![ItemConfig {
                        name: "T_vorlauf".into(),
                        datatype: ItemType::Real,
                        default: Some(Scalar::Real(40.0)),
                    }],
                },
                ChannelConfig {
                    nickname: "WW".into(),
                    table: "warmwasser".into(),
                    round_robin: true,
                    items: vec![ItemConfig {
                        name: "pumpe".into(),
                        datatype: ItemType::Int,
                        default: None,
                    }],
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_scripted_then_exhausted() {
        let mut source = MockSampleSource::scripted(
            "script",
            vec![Sample::scalar("T1", 10), Sample::scalar("T1", 20)],
        );
        assert_eq!(source.next_sample().await, Some(Sample::scalar("T1", 10)));
        assert_eq!(source.next_sample().await, Some(Sample::scalar("T1", 20)));
        assert_eq!(source.next_sample().await, None);
        assert_eq!(source.next_sample().await, None);
    }

    #[tokio::test]
    async fn test_synthetic_cycles_channels() {
        let config = MockSourceConfig {
            count: 5,
            interval: Duration::ZERO,
        };
        let mut source = MockSampleSource::from_blueprint(&blueprint(), config);

        let mut names = Vec::new();
        while let Some(sample) = source.next_sample().await {
            names.push(sample.name);
        }
        assert_eq!(names, vec!["HG", "WW", "HG", "WW", "HG"]);
    }

    #[tokio::test]
    async fn test_synthetic_drifts_real_values() {
        let config = MockSourceConfig {
            count: 3,
            interval: Duration::ZERO,
        };
        let mut source = MockSampleSource::from_blueprint(&blueprint(), config);
        let first = source.next_sample().await.unwrap();
        let _ = source.next_sample().await.unwrap();
        let third = source.next_sample().await.unwrap();

        assert_eq!(first.values, vec![Scalar::Real(40.0)]);
        assert_eq!(third.values, vec![Scalar::Real(40.1)]);
    }
}
