//! RunSignal - lifecycle stop flag shared with the dispatch engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way run flag
///
/// Starts as running; `stop()` flips it to stopped exactly once. Clones share
/// the same flag, so the lifecycle controller keeps one clone and hands the
/// other to the engine.
#[derive(Debug, Clone)]
pub struct RunSignal {
    running: Arc<AtomicBool>,
}

impl RunSignal {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Check whether the engine should keep running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request shutdown. Returns true if this call performed the transition.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}
