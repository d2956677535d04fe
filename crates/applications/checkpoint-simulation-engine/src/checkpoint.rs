//! Checkpoint-interval strategies
//!
//! Every strategy answers one question: given the grace period `delta` a
//! checkpoint costs, how long should a job compute before the next one?
//! All of them use Young's approximation `sqrt(2 * delta * mttf)`; they
//! differ in where the MTTF comes from.
//!
//! - **Young**: a fixed MTTF given up front. Failures are ignored.
//! - **Additive**: an a-priori MTTF that moves a fraction `n` of the way
//!   towards each observed time-to-failure.
//! - **Multiplicative**: an a-priori MTTF scaled by `a^((ttf - mttf) / mttf)`
//!   on each observed failure.
//!
//! The adaptive strategies also run an adjustment timer armed for the current
//! estimate. If it expires before any failure is observed the estimate was
//! too pessimistic and is grown (`+ n * mttf` or `* a`), then the timer is
//! re-armed. Failures re-arm it as well.

use serde::{Deserialize, Serialize};
use tracing::debug;

use checkpoint_core::{EventHandle, Result, Scheduler, SimError, Time};

use crate::types::{JobId, SimEvent};

/// Default smoothing constant of the additive strategy
pub const DEFAULT_ADDITIVE_N: f64 = 0.3;

/// Default growth base of the multiplicative strategy
pub const DEFAULT_MULTIPLICATIVE_A: f64 = 1.1;

/// Strategy selection, resolved once at setup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StrategyKind {
    Young,
    Additive { n: f64 },
    Multiplicative { a: f64 },
}

impl StrategyKind {
    pub fn additive() -> Self {
        StrategyKind::Additive { n: DEFAULT_ADDITIVE_N }
    }

    pub fn multiplicative() -> Self {
        StrategyKind::Multiplicative { a: DEFAULT_MULTIPLICATIVE_A }
    }

    /// Reject parameters outside their valid ranges: `n` in (0, 1], `a` > 1
    pub fn validate(&self) -> Result<()> {
        match *self {
            StrategyKind::Young => Ok(()),
            StrategyKind::Additive { n } => {
                if n > 0.0 && n <= 1.0 {
                    Ok(())
                } else {
                    Err(SimError::config(format!(
                        "additive smoothing constant n must be in (0, 1], got {n}"
                    )))
                }
            }
            StrategyKind::Multiplicative { a } => {
                if a > 1.0 && a.is_finite() {
                    Ok(())
                } else {
                    Err(SimError::config(format!(
                        "multiplicative base a must be strictly greater than 1, got {a}"
                    )))
                }
            }
        }
    }

    pub fn is_adaptive(&self) -> bool {
        !matches!(self, StrategyKind::Young)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Young => "Young",
            StrategyKind::Additive { .. } => "Additive",
            StrategyKind::Multiplicative { .. } => "Multiplicative",
        }
    }
}

/// Young's optimal checkpoint interval, truncated to whole ticks
pub fn young_interval(delta: Time, mttf: Time) -> Time {
    (2.0 * delta as f64 * mttf as f64).sqrt() as Time
}

/// Bring a raw estimate back into `[1, max]`.
///
/// Non-finite values and values at or beyond `max` (the arithmetic blew up,
/// or the estimate no longer fits a timer) land on `max`.
fn settle_estimate(raw: f64, max: Time) -> Time {
    if !raw.is_finite() || raw >= max as f64 {
        max
    } else if raw < 1.0 {
        1
    } else {
        raw as Time
    }
}

/// Checkpoint-interval estimator owned by one job
#[derive(Debug)]
pub struct CheckpointStrategy {
    owner: JobId,
    kind: StrategyKind,
    apriori_mttf: Time,
    adjust_timer: Option<EventHandle>,
    observed_failures: u64,
    adjustments: u64,
}

impl CheckpointStrategy {
    /// Create a strategy for job `owner` starting from `apriori_mttf`.
    ///
    /// The adjustment timer is not armed until [`activate`](Self::activate).
    pub fn new(kind: StrategyKind, apriori_mttf: Time, owner: JobId) -> Result<Self> {
        kind.validate()?;
        if apriori_mttf == 0 {
            return Err(SimError::config("a-priori MTTF must be strictly positive"));
        }

        Ok(CheckpointStrategy {
            owner,
            kind,
            apriori_mttf,
            adjust_timer: None,
            observed_failures: 0,
            adjustments: 0,
        })
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Current MTTF estimate (fixed for Young)
    pub fn apriori_mttf(&self) -> Time {
        self.apriori_mttf
    }

    /// Number of failure observations delivered to this strategy
    pub fn observed_failures(&self) -> u64 {
        self.observed_failures
    }

    /// Number of times the adjustment timer expired and grew the estimate
    pub fn adjustments(&self) -> u64 {
        self.adjustments
    }

    pub fn is_timer_armed(&self) -> bool {
        self.adjust_timer.as_ref().is_some_and(EventHandle::is_live)
    }

    /// Interval to compute before the next checkpoint, given grace period `delta`
    pub fn checkpoint_interval(&self, delta: Time) -> Time {
        let interval = young_interval(delta, self.apriori_mttf);
        if interval == 0 && self.kind.is_adaptive() {
            return delta;
        }
        interval
    }

    /// Arm the adjustment timer (adaptive strategies only)
    pub fn activate<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        if self.kind.is_adaptive() {
            self.rearm(sched)?;
        }
        Ok(())
    }

    /// Feed a freshly observed population-normalized time-to-failure
    pub fn on_failure<S: Scheduler<SimEvent>>(&mut self, ttf: Time, sched: &mut S) -> Result<()> {
        self.observed_failures += 1;

        let current = self.apriori_mttf as f64;
        let observed = ttf as f64;
        let raw = match self.kind {
            StrategyKind::Young => return Ok(()),
            StrategyKind::Additive { n } => current + n * (observed - current),
            StrategyKind::Multiplicative { a } => current * a.powf((observed - current) / current),
        };

        let previous = self.apriori_mttf;
        self.apriori_mttf = settle_estimate(raw, sched.max_delay());
        debug!(
            job = self.owner,
            ttf,
            previous,
            estimate = self.apriori_mttf,
            "MTTF estimate updated on failure"
        );

        self.rearm(sched)
    }

    /// The adjustment timer expired with no failure observed in between
    pub fn on_adjust_timer<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        self.adjust_timer = None;

        let current = self.apriori_mttf as f64;
        let raw = match self.kind {
            StrategyKind::Young => return Ok(()),
            StrategyKind::Additive { n } => current + n * current,
            StrategyKind::Multiplicative { a } => current * a,
        };

        // Truncation must not stall growth on tiny estimates
        let max = sched.max_delay();
        self.apriori_mttf = settle_estimate(raw, max)
            .max(self.apriori_mttf.saturating_add(1))
            .min(max);
        self.adjustments += 1;
        debug!(
            job = self.owner,
            estimate = self.apriori_mttf,
            "No failure within estimate, relaxing MTTF"
        );

        self.rearm(sched)
    }

    fn rearm<S: Scheduler<SimEvent>>(&mut self, sched: &mut S) -> Result<()> {
        if let Some(timer) = self.adjust_timer.take() {
            sched.cancel(&timer);
        }

        let delay = self.apriori_mttf.min(sched.max_delay());
        let handle = sched.schedule(delay, SimEvent::StrategyAdjust { job: self.owner })?;
        self.adjust_timer = Some(handle);
        Ok(())
    }
}
