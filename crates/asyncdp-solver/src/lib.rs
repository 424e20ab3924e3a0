//! Asynchronous sample-based dynamic-programming solvers
//!
//! This crate provides the update rules that run against a
//! [`SharedValueStore`](asyncdp_core::SharedValueStore):
//! - asynchronous monotone Q-value iteration ([`AsyncQvi`])
//! - asynchronous Q-learning with greedy value tracking ([`AsyncQLearning`])
//! - single-threaded variance-reduced value iteration ([`Vrvi`])
//!
//! The async rules run on a fixed pool of OS threads driven by
//! [`AsyncRunner`], which pauses every worker at barrier-synchronized
//! checkpoints to evaluate the greedy policy and decide when to stop.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod qlearning;
pub mod qvi;
pub mod runner;
pub mod sampling;
pub mod schedule;
pub mod vrvi;

use serde::{Deserialize, Serialize};

use asyncdp_core::{Algorithm, CheckpointLog, Result, RunConfig, SampleOracle, SharedValueStore};

// Re-export solvers
pub use qlearning::AsyncQLearning;
pub use qvi::AsyncQvi;
pub use runner::{AsyncRunner, WorkerContext, WorkerRule};
pub use sampling::{cyclic_pair, probe_rng, uniform_pair};
pub use schedule::{ConstantSchedule, PolynomialDecay, Schedule};
pub use vrvi::{InnerRound, Vrvi};

/// Final tables of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Final iteration counter (outer iterations for VRVI)
    pub iterations: u64,
    /// Value estimate per state
    pub values: Vec<f64>,
    /// Greedy action per state
    pub policy: Vec<usize>,
}

/// Validate `config` and run the configured algorithm.
///
/// `make_oracle(worker_id)` builds the oracle owned by each worker; VRVI
/// asks for worker 0 only. The checkpoint header is written before the run.
pub fn solve<O, F>(config: &RunConfig, make_oracle: F, log: &CheckpointLog) -> Result<Solution>
where
    O: SampleOracle,
    F: Fn(usize) -> Result<O>,
{
    config.validate()?;
    // VRVI ignores the pool size
    let threads = if config.algorithm.is_async() {
        config.num_threads
    } else {
        1
    };
    tracing::info!(
        algorithm = %config.algorithm,
        threads,
        states = config.len_state,
        actions = config.len_action,
        "Starting run"
    );
    log.start()?;

    let solution = match config.algorithm {
        Algorithm::AsyncQvi => {
            let store = SharedValueStore::new(config.len_state, config.len_action);
            let runner = AsyncRunner::new(config, &store, log);
            let iterations =
                runner.run(|ctx| AsyncQvi::new(ctx, make_oracle(ctx.worker_id)?))?;
            Solution {
                iterations,
                values: store.values_snapshot(),
                policy: store.policy_snapshot(),
            }
        }
        Algorithm::QLearning => {
            let store = SharedValueStore::with_action_values(config.len_state, config.len_action);
            let runner = AsyncRunner::new(config, &store, log);
            let iterations =
                runner.run(|ctx| AsyncQLearning::new(ctx, make_oracle(ctx.worker_id)?))?;
            Solution {
                iterations,
                values: store.values_snapshot(),
                policy: store.policy_snapshot(),
            }
        }
        Algorithm::Vrvi => {
            let mut solver = Vrvi::new(config, make_oracle(0)?)?;
            let iterations = solver.solve(log)?;
            Solution {
                iterations,
                values: solver.values().to_vec(),
                policy: solver.policy().to_vec(),
            }
        }
    };

    tracing::info!(iterations = solution.iterations, "Run finished");
    Ok(solution)
}
