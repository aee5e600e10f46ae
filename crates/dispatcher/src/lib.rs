//! # Dispatcher
//!
//! Telemetry dispatch and retention engine.
//!
//! Responsibilities:
//! - Pull samples from a `SampleSource`
//! - Write every sample to the SQLite sink
//! - Feed the round-robin sink and the render trigger on their own cadences
//! - Sweep expired rows from the SQLite sink

pub mod clock;
pub mod engine;
pub mod error;
pub mod latest;
pub mod metrics;
pub mod render;
pub mod retention;
pub mod schedule;
pub mod sinks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contracts::{RenderTrigger, RoundRobinStore, RunSignal, SampleSource};
pub use engine::{
    open_relational, open_round_robin, DispatchEngine, EngineBuilder, EngineReport, StopReason,
};
pub use error::DispatcherError;
pub use latest::LatestValues;
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use render::{NoRender, ScriptRenderer};
pub use retention::{RetentionPolicy, SweepOutcome};
pub use schedule::SinkSchedule;
pub use sinks::{
    CompareOp, MemoryRoundRobin, RelationalRow, RoundRobinSink, RrdtoolStore, SqliteSink,
    UpdateOutcome,
};
