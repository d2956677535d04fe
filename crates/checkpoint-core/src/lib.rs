//! Checkpoint Core - Shared types and traits
//!
//! This crate defines the core abstractions used by the checkpoint/restart
//! simulation engine and the collaborators it is wired to:
//!
//! Key types:
//! - Simulated time and its units
//! - `EventHandle` (cancellable handle to a scheduled event)
//! - `Scheduler`, `VariateSource` and `ResultSink` traits
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
