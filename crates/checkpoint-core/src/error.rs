//! Error types for checkpoint simulations

use thiserror::Error;

use crate::types::Time;

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Core error type for checkpoint simulation operations
#[derive(Error, Debug)]
pub enum SimError {
    /// Experiment or strategy parameters outside their valid range.
    /// Raised at construction, before any event is scheduled.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was invoked in a state where it is undefined
    /// (e.g. recovering a job that is still running).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Delay {delay} exceeds the maximum schedule delay {max}")]
    DelayOutOfRange { delay: Time, max: Time },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid-state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
