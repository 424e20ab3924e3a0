//! Sample oracles for asynchronous dynamic programming
//!
//! This crate provides the environments the solvers sample from:
//! - the sailing problem, a windy grid with a goal at its centre
//! - a deterministic tabular MDP for tests and small experiments

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod sailing;
pub mod tabular;

// Re-export oracles
pub use sailing::{SailingConfig, SailingOracle, WIND_DIRECTIONS};
pub use tabular::TabularOracle;

// Re-export core types
pub use asyncdp_core::{Evaluation, EvaluationSettings, SampleOracle, Transition};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{SailingConfig, SailingOracle, TabularOracle};
    pub use asyncdp_core::prelude::*;
}
