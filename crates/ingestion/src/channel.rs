//! Channel-fed source
//!
//! Lets an external decoder task push samples into the engine. Dropping every
//! sender ends the stream.

use contracts::{Sample, SampleSource};
use tokio::sync::mpsc;

/// Sample source backed by an mpsc receiver
pub struct ChannelSource {
    name: String,
    rx: mpsc::Receiver<Sample>,
}

impl ChannelSource {
    /// Create a bounded channel and its source end
    pub fn channel(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<Sample>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                name: name.into(),
                rx,
            },
        )
    }
}

impl SampleSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::channel("decoder", 4);
        tx.send(Sample::scalar("HG", 1)).await.unwrap();
        drop(tx);

        assert_eq!(source.next_sample().await, Some(Sample::scalar("HG", 1)));
        assert_eq!(source.next_sample().await, None);
    }
}
