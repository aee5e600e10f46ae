//! SampleSource trait - Dispatch Engine input interface
//!
//! Abstracts the protocol decoder (serial / socket / replay file) behind a
//! pull interface. Only the dispatch engine task calls it.

use crate::Sample;

/// Sample source trait
///
/// Pulling is the engine's only suspension point: `next_sample` waits until a
/// sample is decoded or the stream ends. There is no timeout.
#[trait_variant::make(SampleSource: Send)]
pub trait LocalSampleSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Pull the next sample
    ///
    /// Returns `None` at end-of-stream. A source is restartable only by
    /// reopening its underlying channel.
    async fn next_sample(&mut self) -> Option<Sample>;
}
