//! Sink implementations
//!
//! SQLite relational sink, the round-robin sink and its two stores.

mod memory;
mod relational;
mod round_robin;
mod rrdtool;

pub use self::memory::{ArchiveRow, MemoryRoundRobin};
pub use self::relational::{
    local_timestamp, CompareOp, RelationalRow, SqliteSink, LOCAL_TIMESTAMP_FORMAT,
};
pub use self::round_robin::{RoundRobinSink, UpdateOutcome};
pub use self::rrdtool::{create_args, update_args, RrdtoolStore};
