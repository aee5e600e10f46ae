//! SinkSchedule - cadence gate for round-robin writes, renders and retention checks

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Cadence gate
///
/// After a fire the next one is `now + cadence`. Missed windows are never
/// replayed: a gate that was stalled across several cadences fires once.
#[derive(Debug, Clone)]
pub struct SinkSchedule {
    cadence: chrono::Duration,
    next_fire_at: DateTime<Utc>,
}

impl SinkSchedule {
    /// Gate whose first fire is at `start + initial_delay`
    pub fn new(cadence: Duration, start: DateTime<Utc>, initial_delay: Duration) -> Self {
        Self {
            cadence: to_chrono(cadence),
            next_fire_at: offset(start, to_chrono(initial_delay)),
        }
    }

    pub fn next_fire_at(&self) -> DateTime<Utc> {
        self.next_fire_at
    }

    pub fn cadence(&self) -> Duration {
        self.cadence.to_std().unwrap_or_default()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_fire_at
    }

    /// Returns true and re-arms the gate if it is due at `now`
    pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_fire_at = offset(now, self.cadence);
        true
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

fn offset(t: DateTime<Utc>, d: chrono::Duration) -> DateTime<Utc> {
    t.checked_add_signed(d).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
