//! Core traits for checkpoint simulations
//!
//! The engine talks to its collaborators through these interfaces:
//! the event scheduler, the random-variate streams and the result sink.

use crate::error::Result;
use crate::types::{EventHandle, RunRecord, Time};

/// Discrete-event scheduler. Events are plain values of type `E`; the
/// driver that owns the scheduler dispatches them when they come due.
pub trait Scheduler<E> {
    /// Current simulated time
    fn now(&self) -> Time;

    /// Largest delay `schedule` accepts
    fn max_delay(&self) -> Time;

    /// Schedule `event` to fire `delay` ticks from now.
    ///
    /// Fails with `SimError::DelayOutOfRange` if `delay > max_delay()`.
    fn schedule(&mut self, delay: Time, event: E) -> Result<EventHandle>;

    /// Cancel a scheduled event. Idempotent.
    fn cancel(&mut self, handle: &EventHandle) {
        handle.cancel();
    }
}

/// An independently seeded stream of random durations
pub trait VariateSource {
    fn sample(&mut self) -> Time;

    /// Mean of the underlying distribution, in ticks
    fn mean(&self) -> f64;
}

/// Destination for experiment records
pub trait ResultSink {
    /// Append one record. Records already written must survive a later failure.
    fn append(&mut self, record: &RunRecord) -> Result<()>;

    /// Flush anything buffered and release the destination
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: VariateSource + ?Sized> VariateSource for Box<S> {
    fn sample(&mut self) -> Time {
        (**self).sample()
    }

    fn mean(&self) -> f64 {
        (**self).mean()
    }
}
