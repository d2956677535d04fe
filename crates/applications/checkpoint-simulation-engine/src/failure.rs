//! Population-wide failure injection
//!
//! One exponential stream stands for the union of `job_count` independent
//! per-job failure processes, so its mean is the single-job MTTF divided by
//! the population size. Failures are serialized: while a victim waits out
//! its restart delay no new failure is drawn, and the next draw is shortened
//! by that delay so fleet-wide failure pressure is conserved.
//!
//! Each failure is reported to every job's strategy, not just the victim's:
//! the estimators all track one fleet-wide MTTF.

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use checkpoint_core::{EventHandle, Result, Scheduler, SimError, Time, VariateSource};

use crate::job::Job;
use crate::types::{JobId, SimEvent};

/// Owns the job population and drives it through failure and recovery
pub struct FailureInjector {
    jobs: Vec<Job>,
    last_failure_time: Time,
    failure_event: Option<EventHandle>,
    restart_event: Option<EventHandle>,
    failure_count: u64,
    no_op_failures: u64,
    failure_source: Box<dyn VariateSource>,
    restart_source: Box<dyn VariateSource>,
    victim_rng: StdRng,
}

impl FailureInjector {
    /// Create an injector over a fixed, non-empty population
    ///
    /// # Arguments
    /// * `jobs` - The population, indexed by `JobId`
    /// * `failure_source` - Gaps between population-wide failures
    /// * `restart_source` - Delay between a failure and the victim's restart
    /// * `victim_rng` - Uniform victim selection
    pub fn new(
        jobs: Vec<Job>,
        failure_source: Box<dyn VariateSource>,
        restart_source: Box<dyn VariateSource>,
        victim_rng: StdRng,
    ) -> Result<Self> {
        if jobs.is_empty() {
            return Err(SimError::config("failure injection needs at least one job"));
        }
        debug_assert!(
            jobs.iter().enumerate().all(|(i, job)| job.id() == i),
            "JobId must match Vec index"
        );

        Ok(FailureInjector {
            jobs,
            last_failure_time: 0,
            failure_event: None,
            restart_event: None,
            failure_count: 0,
            no_op_failures: 0,
            failure_source,
            restart_source,
            victim_rng,
        })
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, id: JobId) -> &Job {
        &self.jobs[id]
    }

    pub fn job_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id]
    }

    /// Failures that struck an incomplete job
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Failures that landed on an already complete job
    pub fn no_op_failures(&self) -> u64 {
        self.no_op_failures
    }

    pub fn last_failure_time(&self) -> Time {
        self.last_failure_time
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart_event.is_some()
    }

    pub fn is_failure_scheduled(&self) -> bool {
        self.failure_event.as_ref().is_some_and(EventHandle::is_live)
    }

    /// Seed the population: schedule the first failure, arm every adaptive
    /// strategy, then start every job.
    pub fn start_population<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        self.last_failure_time = sched.now();
        self.schedule_next_failure(0, sched)?;

        for job in &mut self.jobs {
            job.strategy_mut().activate(sched)?;
        }
        for job in &mut self.jobs {
            job.start(sched)?;
        }

        debug!(jobs = self.jobs.len(), "All jobs started");
        Ok(())
    }

    /// Draw the next failure, shortened by the restart delay already spent.
    /// No-op while a victim is waiting to restart.
    pub fn schedule_next_failure<S: Scheduler<SimEvent>>(
        &mut self,
        previous_restart_delay: Time,
        sched: &mut S,
    ) -> Result<()> {
        if self.restart_event.is_some() {
            return Ok(());
        }
        if let Some(event) = self.failure_event.take() {
            sched.cancel(&event);
        }

        let ttf = self.failure_source.sample();
        let delay = ttf.saturating_sub(previous_restart_delay);
        if delay > sched.max_delay() {
            warn!(ttf, "Next failure lies beyond the scheduler's reach; population runs failure-free");
            return Ok(());
        }

        let handle = sched.schedule(delay, SimEvent::Failure)?;
        debug!(event = %handle.id(), at = handle.fire_at(), "Failure scheduled");
        self.failure_event = Some(handle);
        Ok(())
    }

    /// A failure strikes: broadcast the observation, pick a victim, stop it
    /// and schedule its restart.
    pub fn on_failure<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        self.failure_event = None;

        let now = sched.now();
        let elapsed = now - self.last_failure_time;
        self.last_failure_time = now;
        let ttf = elapsed.saturating_mul(self.jobs.len() as Time);

        for job in &mut self.jobs {
            job.strategy_mut().on_failure(ttf, sched)?;
        }

        let victim = self.victim_rng.gen_range(0..self.jobs.len());
        if self.jobs[victim].is_complete() {
            self.no_op_failures += 1;
            debug!(job = victim, now, "Failure hit a complete job, nothing to do");
            sched.schedule(0, SimEvent::RescheduleFailure { previous_restart_delay: 0 })?;
            return Ok(());
        }

        self.failure_count += 1;
        self.jobs[victim].stop(sched);

        let restart_delay = self.restart_source.sample().min(sched.max_delay());
        self.restart_event = Some(sched.schedule(
            restart_delay,
            SimEvent::Restart { job: victim, restart_delay },
        )?);

        debug!(
            job = victim,
            now,
            ttf,
            restart_delay,
            failures = self.failure_count,
            "Job failed"
        );
        Ok(())
    }

    /// The victim's restart delay elapsed: roll it back and start it again
    pub fn on_restart<S: Scheduler<SimEvent>>(
        &mut self,
        job: JobId,
        restart_delay: Time,
        sched: &mut S,
    ) -> Result<()> {
        self.restart_event = None;

        let victim = &mut self.jobs[job];
        if let Err(e) = victim.recover_from_checkpoint() {
            warn!(job, error = %e, "Recovery invoked on a running job");
            return Err(e);
        }
        victim.start(sched)?;

        sched.schedule(0, SimEvent::RescheduleFailure { previous_restart_delay: restart_delay })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointStrategy, StrategyKind};
    use crate::queue::EventQueue;
    use crate::variates::FixedSequence;
    use rand::SeedableRng;

    fn population(lengths: &[Time], kind: StrategyKind, mttf: Time) -> Vec<Job> {
        lengths
            .iter()
            .enumerate()
            .map(|(id, &length)| {
                let strategy = CheckpointStrategy::new(kind, mttf, id).unwrap();
                Job::new(id, length, strategy, Box::new(FixedSequence::constant(0)))
            })
            .collect()
    }

    fn injector(jobs: Vec<Job>, failures: Vec<Time>, restarts: Vec<Time>) -> FailureInjector {
        FailureInjector::new(
            jobs,
            Box::new(FixedSequence::new(failures).unwrap()),
            Box::new(FixedSequence::new(restarts).unwrap()),
            StdRng::seed_from_u64(0),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_population_rejected() {
        let result = FailureInjector::new(
            Vec::new(),
            Box::new(FixedSequence::constant(1)),
            Box::new(FixedSequence::constant(1)),
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_failure_delay_compensates_restart() {
        let mut sched = EventQueue::new();
        let jobs = population(&[1_000], StrategyKind::Young, 1_000);
        let mut injector = injector(jobs, vec![100], vec![5]);

        injector.schedule_next_failure(30, &mut sched).unwrap();
        assert_eq!(sched.pop_until(Time::MAX), Some(SimEvent::Failure));
        assert_eq!(sched.now(), 70);

        // Restart delay longer than the draw -> fires immediately
        injector.schedule_next_failure(500, &mut sched).unwrap();
        assert_eq!(sched.pop_until(Time::MAX), Some(SimEvent::Failure));
        assert_eq!(sched.now(), 70);
    }

    #[test]
    fn test_rescheduling_replaces_pending_failure() {
        let mut sched = EventQueue::new();
        let jobs = population(&[1_000], StrategyKind::Young, 1_000);
        let mut injector = injector(jobs, vec![100, 200], vec![5]);

        injector.schedule_next_failure(0, &mut sched).unwrap();
        injector.schedule_next_failure(0, &mut sched).unwrap();

        assert_eq!(sched.pending(), 1);
        assert_eq!(sched.pop_until(Time::MAX), Some(SimEvent::Failure));
        assert_eq!(sched.now(), 200);
    }

    #[test]
    fn test_no_failure_beyond_max_delay() {
        let mut sched = EventQueue::new();
        let jobs = population(&[1_000], StrategyKind::Young, 1_000);
        let mut injector = injector(jobs, vec![Time::MAX], vec![5]);

        injector.schedule_next_failure(0, &mut sched).unwrap();

        assert!(!injector.is_failure_scheduled());
        assert!(sched.is_empty());
    }

    #[test]
    fn test_failure_stops_victim_and_blocks_new_failures() {
        let mut sched = EventQueue::new();
        let jobs = population(&[1_000], StrategyKind::Young, 1_000_000);
        let mut injector = injector(jobs, vec![40], vec![5]);
        injector.start_population(&mut sched).unwrap();

        assert_eq!(sched.pop_until(Time::MAX), Some(SimEvent::Failure));
        injector.on_failure(&mut sched).unwrap();

        assert_eq!(injector.failure_count(), 1);
        assert!(injector.is_restart_pending());
        assert!(!injector.job(0).is_running());
        assert_eq!(injector.job(0).completed_duration(), 40);

        // While the restart is pending, failure draws are suppressed
        injector.schedule_next_failure(0, &mut sched).unwrap();
        assert!(!injector.is_failure_scheduled());

        assert_eq!(
            sched.pop_until(Time::MAX),
            Some(SimEvent::Restart { job: 0, restart_delay: 5 })
        );
        injector.on_restart(0, 5, &mut sched).unwrap();

        assert!(!injector.is_restart_pending());
        assert!(injector.job(0).is_running());
        assert_eq!(injector.job(0).completed_duration(), 0, "no checkpoint yet");
        assert_eq!(
            sched.pop_until(Time::MAX),
            Some(SimEvent::RescheduleFailure { previous_restart_delay: 5 })
        );
    }

    #[test]
    fn test_restart_of_running_victim_is_invalid_state() {
        let mut sched = EventQueue::new();
        let jobs = population(&[1_000], StrategyKind::Young, 1_000_000);
        let mut injector = injector(jobs, vec![40], vec![5]);
        injector.start_population(&mut sched).unwrap();

        assert_eq!(sched.pop_until(Time::MAX), Some(SimEvent::Failure));
        injector.on_failure(&mut sched).unwrap();
        injector.job_mut(0).start(&mut sched).unwrap();

        let err = injector.on_restart(0, 5, &mut sched).unwrap_err();

        assert!(matches!(err, SimError::InvalidState(_)));
        assert!(injector.restart_event.is_none());
        assert!(!injector.is_restart_pending());
        assert_eq!(injector.job(0).completed_duration(), 40, "no rollback on error");
    }

    #[test]
    fn test_failure_on_complete_job_is_noop() {
        let mut sched = EventQueue::new();
        let jobs = population(&[0], StrategyKind::Young, 1_000);
        let mut injector = injector(jobs, vec![10], vec![5]);
        injector.start_population(&mut sched).unwrap();

        assert_eq!(sched.pop_until(Time::MAX), Some(SimEvent::Failure));
        injector.on_failure(&mut sched).unwrap();

        assert_eq!(injector.failure_count(), 0);
        assert_eq!(injector.no_op_failures(), 1);
        assert!(!injector.is_restart_pending());
        assert_eq!(
            sched.pop_until(Time::MAX),
            Some(SimEvent::RescheduleFailure { previous_restart_delay: 0 })
        );
        assert_eq!(sched.now(), 10);
    }

    #[test]
    fn test_failure_broadcast_normalizes_ttf() {
        let mut sched = EventQueue::new();
        let jobs = population(&[1_000, 1_000, 1_000, 1_000], StrategyKind::Additive { n: 1.0 }, 7);
        let mut injector = injector(jobs, vec![25], vec![5]);
        injector.start_population(&mut sched).unwrap();

        // Drain to the failure, skipping the adjustment timers and checkpoints
        loop {
            match sched.pop_until(Time::MAX) {
                Some(SimEvent::Failure) => break,
                Some(_) => continue,
                None => panic!("failure never fired"),
            }
        }
        injector.on_failure(&mut sched).unwrap();

        for job in injector.jobs() {
            assert_eq!(job.strategy().observed_failures(), 1);
            // n = 1 replaces the estimate with 25 ticks * 4 jobs
            assert_eq!(job.strategy().apriori_mttf(), 100);
        }
        assert_eq!(injector.last_failure_time(), 25);
    }
}
