//! Time-ordered event queue
//!
//! Concrete `Scheduler` for the simulation. Events are kept in a binary heap
//! ordered by fire time; ties at the same instant fire in the order they were
//! scheduled. Cancelled events stay in the heap until they reach the front
//! and are then dropped without being delivered, or until the heap grows
//! enough that a sweep of dead entries pays off.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use checkpoint_core::{EventHandle, EventId, MAX_SCHEDULE_DELAY, Result, Scheduler, SimError, Time};

/// Heap size below which cancelled entries are never swept
const MIN_COMPACT_THRESHOLD: usize = 1024;

/// Timed event wrapper for priority queue ordering
#[derive(Debug)]
struct TimedEvent<E> {
    time: Time,
    seq: u64,
    event: E,
    live: Rc<Cell<bool>>,
}

// Priority queue orders by (time, seq), earliest first
impl<E> Ord for TimedEvent<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for min-heap (BinaryHeap is max-heap by default)
        (other.time, other.seq).cmp(&(self.time, self.seq))
    }
}

impl<E> PartialOrd for TimedEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Eq for TimedEvent<E> {}

impl<E> PartialEq for TimedEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

/// Discrete-event queue
#[derive(Debug)]
pub struct EventQueue<E> {
    now: Time,
    next_seq: u64,
    max_delay: Time,
    heap: BinaryHeap<TimedEvent<E>>,
    compact_threshold: usize,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::with_max_delay(MAX_SCHEDULE_DELAY)
    }

    pub fn with_max_delay(max_delay: Time) -> Self {
        EventQueue {
            now: 0,
            next_seq: 0,
            max_delay,
            heap: BinaryHeap::new(),
            compact_threshold: MIN_COMPACT_THRESHOLD,
        }
    }

    /// Pop the next live event due at or before `horizon`, advancing the
    /// clock to its fire time. Returns `None` once nothing live remains
    /// before the horizon; the clock then rests at the horizon.
    pub fn pop_until(&mut self, horizon: Time) -> Option<E> {
        loop {
            let due = match self.heap.peek() {
                Some(top) => top.time <= horizon,
                None => false,
            };
            if !due {
                self.now = self.now.max(horizon);
                return None;
            }

            let timed = self.heap.pop()?;
            if !timed.live.get() {
                continue;
            }

            timed.live.set(false);
            self.now = timed.time;
            return Some(timed.event);
        }
    }

    /// Number of live events still waiting to fire
    pub fn pending(&self) -> usize {
        self.heap.iter().filter(|timed| timed.live.get()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Drop cancelled entries once the heap outgrows the threshold
    fn compact(&mut self) {
        if self.heap.len() < self.compact_threshold {
            return;
        }
        self.heap.retain(|timed| timed.live.get());
        self.compact_threshold = (self.heap.len() * 2).max(MIN_COMPACT_THRESHOLD);
    }
}

impl<E> Scheduler<E> for EventQueue<E> {
    fn now(&self) -> Time {
        self.now
    }

    fn max_delay(&self) -> Time {
        self.max_delay
    }

    fn schedule(&mut self, delay: Time, event: E) -> Result<EventHandle> {
        if delay > self.max_delay {
            return Err(SimError::DelayOutOfRange {
                delay,
                max: self.max_delay,
            });
        }

        self.compact();

        let seq = self.next_seq;
        self.next_seq += 1;

        let time = self.now.saturating_add(delay);
        let live = Rc::new(Cell::new(true));
        self.heap.push(TimedEvent {
            time,
            seq,
            event,
            live: Rc::clone(&live),
        });

        Ok(EventHandle::new(EventId(seq), time, live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_fire_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule(30, "c").unwrap();
        queue.schedule(10, "a").unwrap();
        queue.schedule(20, "b").unwrap();

        assert_eq!(queue.pop_until(100), Some("a"));
        assert_eq!(queue.now(), 10);
        assert_eq!(queue.pop_until(100), Some("b"));
        assert_eq!(queue.pop_until(100), Some("c"));
        assert_eq!(queue.now(), 30);
        assert_eq!(queue.pop_until(100), None);
        assert_eq!(queue.now(), 100);
    }

    #[test]
    fn test_same_instant_is_fifo() {
        let mut queue = EventQueue::new();
        for label in ["first", "second", "third", "fourth"] {
            queue.schedule(5, label).unwrap();
        }
        // Scheduled later, still due at the same instant
        queue.schedule(5, "fifth").unwrap();

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_until(5)).collect();
        assert_eq!(order, vec!["first", "second", "third", "fourth", "fifth"]);
    }

    #[test]
    fn test_cancelled_event_never_fires() {
        let mut queue = EventQueue::new();
        let doomed = queue.schedule(1, "doomed").unwrap();
        queue.schedule(2, "kept").unwrap();

        queue.cancel(&doomed);
        assert!(!doomed.is_live());
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.pop_until(10), Some("kept"));
        assert_eq!(queue.pop_until(10), None);
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut queue = EventQueue::new();
        let handle = queue.schedule(0, 1u8).unwrap();

        assert_eq!(queue.pop_until(0), Some(1));
        assert!(!handle.is_live());

        queue.cancel(&handle);
        queue.cancel(&handle);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_horizon_stops_delivery() {
        let mut queue = EventQueue::new();
        queue.schedule(50, "late").unwrap();

        assert_eq!(queue.pop_until(49), None);
        assert_eq!(queue.now(), 49);
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.pop_until(50), Some("late"));
    }

    #[test]
    fn test_delay_beyond_maximum_is_rejected() {
        let mut queue = EventQueue::with_max_delay(100);

        assert!(queue.schedule(100, ()).is_ok());
        let err = queue.schedule(101, ()).unwrap_err();
        assert!(matches!(err, SimError::DelayOutOfRange { delay: 101, max: 100 }));
    }

    #[test]
    fn test_cancelled_entries_are_swept() {
        let mut queue = EventQueue::new();
        for i in 0..(MIN_COMPACT_THRESHOLD as u64 * 3) {
            let handle = queue.schedule(100 + i, i).unwrap();
            queue.cancel(&handle);
        }
        queue.schedule(5, u64::MAX).unwrap();

        assert!(queue.heap.len() < MIN_COMPACT_THRESHOLD * 2);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.pop_until(Time::MAX), Some(u64::MAX));
    }

    #[test]
    fn test_delays_are_relative_to_now() {
        let mut queue = EventQueue::new();
        queue.schedule(10, "tick").unwrap();
        queue.pop_until(100);

        let handle = queue.schedule(5, "tock").unwrap();
        assert_eq!(handle.fire_at(), 15);
    }
}
