//! Command implementations.

mod info;
mod provision;
mod run;
mod validate;

pub use info::run_info;
pub use provision::run_provision;
pub use run::run_collector;
pub use validate::run_validate;
