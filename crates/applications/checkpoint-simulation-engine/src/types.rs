//! Core types for the simulation engine

use serde::{Deserialize, Serialize};

use checkpoint_core::Time;

/// Index of a job in the population
pub type JobId = usize;

/// Simulation event. Every scheduled callback is one of these; the driver
/// routes it to the job, strategy or failure injector that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// The job has computed all of its remaining work
    JobFinish { job: JobId },
    /// The job's checkpoint interval elapsed: stop and save
    JobCheckpoint { job: JobId },
    /// Grace period after a checkpoint elapsed: commit it and resume
    JobResume { job: JobId },
    /// No failure was observed for a whole MTTF estimate
    StrategyAdjust { job: JobId },
    /// A population-wide failure strikes
    Failure,
    /// The failed job may recover and restart
    Restart { job: JobId, restart_delay: Time },
    /// Draw and schedule the next failure
    RescheduleFailure { previous_restart_delay: Time },
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Running,
    StoppedIncomplete,
    StoppedComplete,
}
