//! Checkpoint Simulation Engine
//!
//! Discrete-event simulator comparing checkpoint-interval strategies (Young,
//! Additive, Multiplicative) for a population of long-running jobs subject
//! to random failures.

pub mod types;
pub mod queue;
pub mod variates;
pub mod checkpoint;
pub mod job;
pub mod failure;
pub mod config;
pub mod simulator;
pub mod output;

pub use checkpoint::{CheckpointStrategy, StrategyKind};
pub use config::ExperimentConfig;
pub use simulator::{RunReport, Simulation, run_sweep};
