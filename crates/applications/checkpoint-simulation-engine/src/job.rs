//! Job checkpoint/failure/recovery state machine
//!
//! A job is either running (finish and checkpoint events live) or stopped
//! (no live events of its own). While running it computes towards
//! `initial_duration`; every checkpoint interval it stops, waits a grace
//! period `delta`, commits the checkpoint and resumes. A failure stops it
//! from the outside and `recover_from_checkpoint` rolls its progress back to
//! the last committed checkpoint.

use tracing::debug;

use checkpoint_core::{EventHandle, MILLISECOND, Result, Scheduler, SimError, Time, VariateSource};

use crate::checkpoint::CheckpointStrategy;
use crate::types::{JobId, JobState, SimEvent};

/// Interval used when a strategy yields 0, so the simulation keeps moving
pub const MIN_CHECKPOINT_INTERVAL: Time = 10 * MILLISECOND;

/// A long-running computation subject to failures
pub struct Job {
    id: JobId,
    initial_duration: Time,
    completed_duration: Time,
    checkpointed_duration: Time,
    last_resume_time: Time,
    completed_at: Time,
    grace_period: Time,
    checkpoints: u64,

    finish_event: Option<EventHandle>,
    checkpoint_event: Option<EventHandle>,
    resume_event: Option<EventHandle>,

    strategy: CheckpointStrategy,
    delta_source: Box<dyn VariateSource>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("initial_duration", &self.initial_duration)
            .field("completed_duration", &self.completed_duration)
            .field("checkpointed_duration", &self.checkpointed_duration)
            .field("completed_at", &self.completed_at)
            .field("state", &self.state())
            .finish()
    }
}

impl Job {
    pub fn new(
        id: JobId,
        initial_duration: Time,
        strategy: CheckpointStrategy,
        delta_source: Box<dyn VariateSource>,
    ) -> Self {
        Job {
            id,
            initial_duration,
            completed_duration: 0,
            checkpointed_duration: 0,
            last_resume_time: 0,
            completed_at: 0,
            grace_period: 0,
            checkpoints: 0,
            finish_event: None,
            checkpoint_event: None,
            resume_event: None,
            strategy,
            delta_source,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn initial_duration(&self) -> Time {
        self.initial_duration
    }

    pub fn completed_duration(&self) -> Time {
        self.completed_duration
    }

    pub fn checkpointed_duration(&self) -> Time {
        self.checkpointed_duration
    }

    pub fn last_resume_time(&self) -> Time {
        self.last_resume_time
    }

    /// Time the job completed, or 0 while it has not
    pub fn completed_at(&self) -> Time {
        self.completed_at
    }

    /// Number of committed checkpoints
    pub fn checkpoints(&self) -> u64 {
        self.checkpoints
    }

    pub fn strategy(&self) -> &CheckpointStrategy {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut CheckpointStrategy {
        &mut self.strategy
    }

    pub fn is_complete(&self) -> bool {
        self.completed_duration == self.initial_duration
    }

    pub fn is_running(&self) -> bool {
        self.finish_event.is_some()
    }

    /// True while a post-checkpoint resume is pending
    pub fn is_resume_pending(&self) -> bool {
        self.resume_event.as_ref().is_some_and(EventHandle::is_live)
    }

    pub fn state(&self) -> JobState {
        if self.is_running() {
            JobState::Running
        } else if self.is_complete() {
            JobState::StoppedComplete
        } else {
            JobState::StoppedIncomplete
        }
    }

    /// Start (or restart) computing. A running job is stopped first; a
    /// pending post-checkpoint resume is cancelled. A complete job stays put.
    pub fn start<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        self.stop(sched);

        let remaining = self.initial_duration - self.completed_duration;
        if remaining == 0 {
            return Ok(());
        }

        let now = sched.now();
        self.last_resume_time = now;
        self.finish_event = Some(sched.schedule(remaining, SimEvent::JobFinish { job: self.id })?);

        let max_delay = sched.max_delay();
        let delta = self.delta_source.sample().min(max_delay);
        let mut interval = self.strategy.checkpoint_interval(delta);
        if interval == 0 {
            interval = MIN_CHECKPOINT_INTERVAL;
        }
        let interval = interval.min(max_delay);

        self.grace_period = delta;
        self.checkpoint_event =
            Some(sched.schedule(interval, SimEvent::JobCheckpoint { job: self.id })?);

        debug!(
            job = self.id,
            now,
            remaining,
            interval,
            delta,
            "Job started"
        );
        Ok(())
    }

    /// Stop computing and account for the work done since the last start.
    /// Cancels any pending checkpoint or resume. No-op when already stopped.
    pub fn stop<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) {
        if let Some(event) = self.checkpoint_event.take() {
            sched.cancel(&event);
        }
        if let Some(event) = self.resume_event.take() {
            sched.cancel(&event);
        }

        if self.finish_event.is_none() || self.is_complete() {
            return;
        }
        if let Some(event) = self.finish_event.take() {
            sched.cancel(&event);
        }

        let now = sched.now();
        let ran = now.saturating_sub(self.last_resume_time);
        debug_assert!(
            self.completed_duration + ran <= self.initial_duration,
            "Job {} ran past its end",
            self.id
        );
        self.completed_duration = (self.completed_duration + ran).min(self.initial_duration);

        if self.is_complete() {
            self.completed_at = now;
            debug!(job = self.id, completed_at = now, "Job complete");
        }
    }

    /// Finish event fired
    pub fn on_finish<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) {
        self.stop(sched);
    }

    /// Checkpoint event fired: stop, then resume after the grace period
    pub fn on_checkpoint<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        self.checkpoint_event = None;
        self.stop(sched);

        if self.is_complete() {
            return Ok(());
        }
        self.resume_event = Some(sched.schedule(self.grace_period, SimEvent::JobResume { job: self.id })?);
        Ok(())
    }

    /// Grace period elapsed: commit the checkpoint and carry on
    pub fn on_resume<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        self.resume_event = None;
        self.checkpointed_duration = self.completed_duration;
        self.checkpoints += 1;
        self.start(sched)
    }

    /// Roll progress back to the last committed checkpoint.
    ///
    /// Fails with `SimError::InvalidState` if the job is running. Does not restart it.
    pub fn recover_from_checkpoint(&mut self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        if self.is_running() {
            return Err(SimError::state(format!(
                "job {} cannot recover from its checkpoint while running",
                self.id
            )));
        }

        debug!(
            job = self.id,
            lost = self.completed_duration - self.checkpointed_duration,
            "Rolling back to checkpoint"
        );
        self.completed_duration = self.checkpointed_duration;
        Ok(())
    }
}
