//! Core types shared across the checkpoint simulation components

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Simulated time, in ticks. One tick is one microsecond.
pub type Time = u64;

pub const MICROSECOND: Time = 1;
pub const MILLISECOND: Time = 1_000 * MICROSECOND;
pub const SECOND: Time = 1_000 * MILLISECOND;
pub const MINUTE: Time = 60 * SECOND;
pub const HOUR: Time = 60 * MINUTE;

/// Largest delay a scheduler accepts. Estimates that feed timers are clamped to it.
pub const MAX_SCHEDULE_DELAY: Time = i64::MAX as Time;

/// Unique identifier for a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ev#{}", self.0)
    }
}

/// Handle to a scheduled event.
///
/// The handle shares a liveness flag with the queued entry. Cancelling is
/// idempotent, and cancelling an event that already fired does nothing.
/// Owners keep at most one handle per timer role and drop it (`Option::take`)
/// right after cancelling.
#[derive(Debug, Clone)]
pub struct EventHandle {
    id: EventId,
    fire_at: Time,
    live: Rc<Cell<bool>>,
}

impl EventHandle {
    pub fn new(id: EventId, fire_at: Time, live: Rc<Cell<bool>>) -> Self {
        Self { id, fire_at, live }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    /// Simulated time at which the event is (or was) due
    pub fn fire_at(&self) -> Time {
        self.fire_at
    }

    /// True until the event fires or is cancelled
    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    pub fn cancel(&self) {
        self.live.set(false);
    }
}

/// One row of experiment output: the outcome of a single simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub mttf_hours: u64,
    pub overhead_percent: f64,
    pub failure_count: u64,
    pub incomplete_jobs: usize,
}
