//! Discrete-event simulator for checkpoint/restart experiments
//!
//! Builds a job population from an `ExperimentConfig`, drives it through
//! checkpoints, failures and restarts until the time budget runs out, and
//! reports the completion-time overhead.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use checkpoint_core::{HOUR, Result, ResultSink, RunRecord, Scheduler, Time, VariateSource};

use crate::checkpoint::CheckpointStrategy;
use crate::config::ExperimentConfig;
use crate::failure::FailureInjector;
use crate::job::Job;
use crate::queue::EventQueue;
use crate::types::SimEvent;
use crate::variates::{ExponentialSampler, SeedSplitter};

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: String,
    pub total_jobs: usize,
    pub incomplete_jobs: usize,
    pub failure_count: u64,
    pub no_op_failures: u64,
    pub checkpoints: u64,
    /// Mean initial duration, in ticks
    pub average_job_length: f64,
    /// Mean `completed_at` over the whole population (0 for incomplete jobs), in ticks
    pub average_completion_time: f64,
    /// `average_completion_time - average_job_length`, in ticks
    pub added_time: f64,
    pub overhead_percent: f64,
    pub simulated_until: Time,
}

impl RunReport {
    pub fn to_record(&self, mttf_hours: u64) -> RunRecord {
        RunRecord {
            mttf_hours,
            overhead_percent: self.overhead_percent,
            failure_count: self.failure_count,
            incomplete_jobs: self.incomplete_jobs,
        }
    }
}

/// One checkpoint/restart simulation
pub struct Simulation {
    queue: EventQueue<SimEvent>,
    injector: FailureInjector,
    strategy_name: &'static str,
    horizon: Time,
    started: bool,
    events_processed: u64,
}

impl Simulation {
    /// Build the population described by `config`.
    ///
    /// Streams are derived from the seed in a fixed order: restart delays,
    /// failures, job lengths, then one grace-period stream per job. Victim
    /// selection uses the master stream.
    pub fn new(config: &ExperimentConfig) -> Result<Self> {
        config.validate()?;

        let mut seeds = SeedSplitter::new(config.seed);
        let restart_source = ExponentialSampler::new(config.restart_delay_mean(), seeds.next_seed())?;
        let failure_source =
            ExponentialSampler::new(config.population_failure_mean(), seeds.next_seed())?;
        let failure_gap_hours = failure_source.mean() / HOUR as f64;
        let mut lengths = ExponentialSampler::new(config.mean_job_length(), seeds.next_seed())?;

        let apriori_mttf = config.apriori_mttf();
        let jobs = (0..config.job_count)
            .map(|id| {
                let strategy = CheckpointStrategy::new(config.strategy, apriori_mttf, id)?;
                let deltas = ExponentialSampler::new(config.delta_mean(), seeds.next_seed())?;
                Ok(Job::new(id, lengths.sample(), strategy, Box::new(deltas)))
            })
            .collect::<Result<Vec<_>>>()?;

        let injector = FailureInjector::new(
            jobs,
            Box::new(failure_source),
            Box::new(restart_source),
            seeds.into_rng(),
        )?;

        let simulation = Self::from_parts(injector, config.strategy.name(), config.horizon());
        info!(
            jobs = config.job_count,
            strategy = config.strategy.name(),
            mttf_hours = config.true_mttf_hours,
            average_length_hours = simulation.average_job_length() / HOUR as f64,
            failure_gap_hours,
            "All jobs created"
        );
        Ok(simulation)
    }

    /// Assemble a simulation from an already built population
    pub fn from_parts(injector: FailureInjector, strategy_name: &'static str, horizon: Time) -> Self {
        Simulation {
            queue: EventQueue::new(),
            injector,
            strategy_name,
            horizon,
            started: false,
            events_processed: 0,
        }
    }

    pub fn now(&self) -> Time {
        self.queue.now()
    }

    pub fn horizon(&self) -> Time {
        self.horizon
    }

    pub fn injector(&self) -> &FailureInjector {
        &self.injector
    }

    pub fn jobs(&self) -> &[Job] {
        self.injector.jobs()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn all_jobs_completed(&self) -> bool {
        self.jobs().iter().all(Job::is_complete)
    }

    /// Seed the failure process and start every job. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.injector.start_population(&mut self.queue)
    }

    /// Run to the horizon and report
    pub fn run(&mut self) -> Result<RunReport> {
        self.run_until(self.horizon)?;

        let report = self.collect_results();
        info!(
            failures = report.failure_count,
            average_completion_hours = report.average_completion_time / HOUR as f64,
            added_hours = report.added_time / HOUR as f64,
            overhead_percent = report.overhead_percent,
            events = self.events_processed,
            "Simulation finished"
        );
        if report.incomplete_jobs > 0 {
            warn!(
                incomplete = report.incomplete_jobs,
                "Simulation stopped before every job completed"
            );
        }
        Ok(report)
    }

    /// Deliver every event due at or before `until` (capped at the horizon)
    pub fn run_until(&mut self, until: Time) -> Result<()> {
        self.start()?;

        let until = until.min(self.horizon);
        while let Some(event) = self.queue.pop_until(until) {
            self.process_event(event)?;
            self.events_processed += 1;
        }
        Ok(())
    }

    /// Process a single event
    fn process_event(&mut self, event: SimEvent) -> Result<()> {
        let queue = &mut self.queue;
        match event {
            SimEvent::JobFinish { job } => {
                self.injector.job_mut(job).on_finish(queue);
                Ok(())
            }
            SimEvent::JobCheckpoint { job } => self.injector.job_mut(job).on_checkpoint(queue),
            SimEvent::JobResume { job } => self.injector.job_mut(job).on_resume(queue),
            SimEvent::StrategyAdjust { job } => {
                self.injector.job_mut(job).strategy_mut().on_adjust_timer(queue)
            }
            SimEvent::Failure => self.injector.on_failure(queue),
            SimEvent::Restart { job, restart_delay } => {
                self.injector.on_restart(job, restart_delay, queue)
            }
            SimEvent::RescheduleFailure { previous_restart_delay } => {
                self.injector.schedule_next_failure(previous_restart_delay, queue)
            }
        }
    }

    fn average_job_length(&self) -> f64 {
        let jobs = self.jobs();
        jobs.iter().map(|j| j.initial_duration() as f64).sum::<f64>() / jobs.len() as f64
    }

    /// Collect simulation results
    pub fn collect_results(&self) -> RunReport {
        let jobs = self.jobs();
        let total_jobs = jobs.len();

        let average_job_length = self.average_job_length();
        let average_completion_time =
            jobs.iter().map(|j| j.completed_at() as f64).sum::<f64>() / total_jobs as f64;
        let added_time = average_completion_time - average_job_length;
        let overhead_percent = if average_job_length > 0.0 {
            added_time * 100.0 / average_job_length
        } else {
            0.0
        };

        RunReport {
            strategy: self.strategy_name.to_string(),
            total_jobs,
            incomplete_jobs: jobs.iter().filter(|j| !j.is_complete()).count(),
            failure_count: self.injector.failure_count(),
            no_op_failures: self.injector.no_op_failures(),
            checkpoints: jobs.iter().map(Job::checkpoints).sum(),
            average_job_length,
            average_completion_time,
            added_time,
            overhead_percent,
            simulated_until: self.now(),
        }
    }
}

/// Run one simulation per true MTTF (hours), appending a record per run to every sink.
///
/// Every sink is finished even when a run fails, so records from the runs
/// that completed are kept. The first error is returned.
pub fn run_sweep(
    base: &ExperimentConfig,
    mttf_hours: &[u64],
    sinks: &mut [&mut dyn ResultSink],
) -> Result<Vec<(u64, RunReport)>> {
    base.validate()?;

    let outcome = sweep_runs(base, mttf_hours, sinks);
    if let Err(e) = &outcome {
        warn!(error = %e, "Sweep aborted, finishing sinks with the runs completed so far");
    }

    let mut finished = Ok(());
    for sink in sinks.iter_mut() {
        let result = sink.finish();
        if finished.is_ok() {
            finished = result;
        }
    }

    let reports = outcome?;
    finished?;
    Ok(reports)
}

fn sweep_runs(
    base: &ExperimentConfig,
    mttf_hours: &[u64],
    sinks: &mut [&mut dyn ResultSink],
) -> Result<Vec<(u64, RunReport)>> {
    let mut reports = Vec::with_capacity(mttf_hours.len());
    for &mttf in mttf_hours {
        let config = base.with_true_mttf_hours(mttf as f64);
        let report = Simulation::new(&config)?.run()?;

        let record = report.to_record(mttf);
        for sink in sinks.iter_mut() {
            sink.append(&record)?;
        }
        reports.push((mttf, report));
    }
    Ok(reports)
}

/// Build a simulation over hand-made variate streams (scenario tests, scripted runs)
pub fn scripted_simulation(
    jobs: Vec<Job>,
    failure_source: impl VariateSource + 'static,
    restart_source: impl VariateSource + 'static,
    victim_seed: u64,
    horizon: Time,
) -> Result<Simulation> {
    use rand::SeedableRng;

    let strategy_name = jobs
        .first()
        .map(|j| j.strategy().kind().name())
        .unwrap_or("none");
    let injector = FailureInjector::new(
        jobs,
        Box::new(failure_source),
        Box::new(restart_source),
        rand::rngs::StdRng::seed_from_u64(victim_seed),
    )?;
    Ok(Simulation::from_parts(injector, strategy_name, horizon))
}
