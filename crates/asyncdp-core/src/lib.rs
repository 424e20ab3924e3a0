//! Core types for asynchronous sample-based dynamic programming
//!
//! This crate provides the pieces shared by every solver: the run
//! configuration, the lock-guarded value/policy store that worker threads
//! mutate concurrently, the control record used at checkpoints, and the
//! sampling contract an environment must satisfy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

pub mod config;
pub mod control;
pub mod error;
pub mod evaluation;
pub mod oracle;
pub mod report;
pub mod store;

// Re-export core traits and types
pub use config::{Algorithm, RunConfig, SampleStyle};
pub use control::ControlState;
pub use error::{DpError, Result};
pub use evaluation::{monte_carlo, Evaluation, EvaluationSettings};
pub use oracle::{SampleOracle, Transition};
pub use report::{Checkpoint, CheckpointLog, RunReport, LOG_HEADER};
pub use store::{SharedValueStore, StoreWriter};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Algorithm, ControlState, DpError, Evaluation, Result, RunConfig, SampleOracle,
        SampleStyle, SharedValueStore, Transition,
    };
}
