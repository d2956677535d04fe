//! Experiment configuration
//!
//! All parameters are consumed when a simulation is built and never mutated
//! afterwards. Durations are given in human units and converted to ticks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use checkpoint_core::{HOUR, MAX_SCHEDULE_DELAY, MINUTE, Result, SimError, Time};

use crate::checkpoint::StrategyKind;

/// Default true-MTTF sweep, in hours
pub const DEFAULT_MTTF_SWEEP_HOURS: &[u64] = &[
    100, 200, 300, 400, 500, 600, 700, 800, 900, 1_000, 2_000, 3_000, 4_000, 5_000, 6_000, 7_000,
    8_000, 9_000, 10_000, 20_000, 30_000, 40_000, 50_000, 60_000, 70_000, 80_000, 90_000, 100_000,
];

/// Horizon, in multiples of the mean job length, when none is given
pub const DEFAULT_HORIZON_FACTOR: f64 = 20.0;

/// Parameters of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub strategy: StrategyKind,
    /// True MTTF of a single job, used to generate failures
    pub true_mttf_hours: f64,
    /// MTTF handed to the strategies. `None` means "the true MTTF".
    pub apriori_mttf_hours: Option<f64>,
    /// Mean checkpoint grace period
    pub delta_minutes: f64,
    /// Mean delay between a failure and the victim's restart
    pub restart_delay_minutes: f64,
    pub job_count: usize,
    pub mean_job_length_hours: f64,
    pub seed: u64,
    /// Simulated time budget. `None` means 20 mean job lengths.
    pub horizon_hours: Option<f64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            strategy: StrategyKind::Young,
            true_mttf_hours: 1_000.0,
            apriori_mttf_hours: None,
            delta_minutes: 5.0,
            restart_delay_minutes: 5.0,
            job_count: 500,
            mean_job_length_hours: 1_000.0,
            seed: 0,
            horizon_hours: None,
        }
    }
}

fn hours(value: f64) -> f64 {
    value * HOUR as f64
}

impl ExperimentConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ExperimentConfig = serde_json::from_str(&raw).map_err(|e| {
            SimError::serialization(format!("{}: {e}", path.as_ref().display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Copy of this configuration with a different true MTTF
    pub fn with_true_mttf_hours(&self, true_mttf_hours: f64) -> Self {
        ExperimentConfig {
            true_mttf_hours,
            ..self.clone()
        }
    }

    /// Reject parameters outside their valid ranges
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;

        if self.job_count == 0 {
            return Err(SimError::config("job_count must be at least 1"));
        }
        if !(self.true_mttf_hours > 0.0) {
            return Err(SimError::config(format!(
                "true_mttf_hours must be strictly positive, got {}",
                self.true_mttf_hours
            )));
        }
        if let Some(apriori) = self.apriori_mttf_hours {
            if !(apriori > 0.0 && apriori.is_finite()) {
                return Err(SimError::config(format!(
                    "apriori_mttf_hours must be positive and finite, got {apriori}"
                )));
            }
        }
        if self.apriori_mttf() == 0 {
            return Err(SimError::config("a-priori MTTF rounds down to zero ticks"));
        }
        for (name, value) in [
            ("delta_minutes", self.delta_minutes),
            ("restart_delay_minutes", self.restart_delay_minutes),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(SimError::config(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }
        if !(self.mean_job_length_hours > 0.0 && self.mean_job_length_hours.is_finite()) {
            return Err(SimError::config(format!(
                "mean_job_length_hours must be positive and finite, got {}",
                self.mean_job_length_hours
            )));
        }
        if let Some(horizon) = self.horizon_hours {
            if !(horizon > 0.0 && horizon.is_finite()) {
                return Err(SimError::config(format!(
                    "horizon_hours must be positive and finite, got {horizon}"
                )));
            }
        }
        Ok(())
    }

    /// True single-job MTTF, in ticks (may be infinite: no failures)
    pub fn true_mttf(&self) -> f64 {
        hours(self.true_mttf_hours)
    }

    /// Mean gap between population-wide failures, in ticks
    pub fn population_failure_mean(&self) -> f64 {
        self.true_mttf() / self.job_count as f64
    }

    /// MTTF handed to every strategy, in ticks
    pub fn apriori_mttf(&self) -> Time {
        let apriori = hours(self.apriori_mttf_hours.unwrap_or(self.true_mttf_hours));
        if apriori >= MAX_SCHEDULE_DELAY as f64 {
            MAX_SCHEDULE_DELAY
        } else {
            apriori as Time
        }
    }

    pub fn delta_mean(&self) -> f64 {
        self.delta_minutes * MINUTE as f64
    }

    pub fn restart_delay_mean(&self) -> f64 {
        self.restart_delay_minutes * MINUTE as f64
    }

    pub fn mean_job_length(&self) -> f64 {
        hours(self.mean_job_length_hours)
    }

    pub fn horizon(&self) -> Time {
        let horizon_hours = self
            .horizon_hours
            .unwrap_or(self.mean_job_length_hours * DEFAULT_HORIZON_FACTOR);
        hours(horizon_hours) as Time
    }

    /// One-line description, used as the CSV preamble
    pub fn describe(&self) -> String {
        format!(
            "strategy = {},delta (mean) = {}min,restart (mean) = {}min,jobs = {},job length (mean) = {}h,a-priori mttf = {}",
            self.strategy.name(),
            self.delta_minutes,
            self.restart_delay_minutes,
            self.job_count,
            self.mean_job_length_hours,
            self.apriori_mttf_hours
                .map(|h| format!("{h}h"))
                .unwrap_or_else(|| "true mttf".to_string()),
        )
    }
}
