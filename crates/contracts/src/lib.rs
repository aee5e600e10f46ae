//! # Contracts
//!
//! Frozen interface contracts shared by every collector crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All persisted timestamps are UTC epoch seconds (`i64`)
//! - Local wall-clock text is derived from the same instant at insert time

mod blueprint;
mod error;
mod sample;
mod signal;
mod sink;
mod source;

pub use blueprint::*;
pub use error::*;
pub use sample::{Sample, Scalar};
pub use signal::RunSignal;
pub use sink::*;
pub use source::{LocalSampleSource, SampleSource};
