//! Run configuration shared read-only by every worker

use serde::{Deserialize, Serialize};

use crate::{DpError, Result};

/// Which solver drives the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Asynchronous monotone Q-value iteration
    AsyncQvi,
    /// Asynchronous Q-learning with greedy value tracking
    QLearning,
    /// Single-threaded variance-reduced value iteration
    Vrvi,
}

impl Algorithm {
    /// Map the numeric CLI code (`0`, `1`, `2`) to an algorithm
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::AsyncQvi),
            1 => Ok(Self::QLearning),
            2 => Ok(Self::Vrvi),
            other => Err(DpError::Config(format!(
                "unknown algorithm code {other} (expected 0, 1 or 2)"
            ))),
        }
    }

    /// Whether the algorithm runs on the worker pool
    #[must_use]
    pub fn is_async(self) -> bool {
        !matches!(self, Self::Vrvi)
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AsyncQvi => "async-qvi",
            Self::QLearning => "q-learning",
            Self::Vrvi => "vrvi",
        };
        f.write_str(name)
    }
}

/// How a worker chooses the next (state, action) pair to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStyle {
    /// Independent uniform draws of state and action
    Uniform,
    /// Deterministic round-robin sweep driven by the global counter
    Cyclic,
    /// Follow the sampled trajectory, exploring with probability `explore`
    Markovian,
}

impl SampleStyle {
    /// Map the numeric CLI code (`0`, `1`, `2`) to a sampling style
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::Uniform),
            1 => Ok(Self::Cyclic),
            2 => Ok(Self::Markovian),
            other => Err(DpError::Config(format!(
                "unknown sampling style {other} (expected 0, 1 or 2)"
            ))),
        }
    }
}

/// Immutable run parameters.
///
/// Built once before any worker starts and shared by reference afterwards;
/// nothing in here changes during a run. Values that do change (counter,
/// checkpoint threshold, stop flag, current learning rate) live in
/// [`ControlState`](crate::ControlState).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Solver to run
    pub algorithm: Algorithm,
    /// Probe selection style
    pub style: SampleStyle,
    /// Worker pool size
    pub num_threads: usize,
    /// Number of states S
    pub len_state: usize,
    /// Number of actions A
    pub len_action: usize,
    /// Discount factor, in `[0, 1)`
    pub gamma: f64,
    /// Bias parameter of AsyncQVI
    pub epsilon: f64,
    /// Probability that Markovian Q-learning takes a uniform random action
    pub explore: f64,
    /// Scale of the Q-learning learning-rate schedule
    pub alpha: f64,
    /// Iteration budget for the async solvers, outer iterations for VRVI
    pub max_outer_iter: u64,
    /// Samples per probe for AsyncQVI, inner rounds for VRVI
    pub max_inner_iter: u64,
    /// VRVI samples per pair in the recentering phase
    pub sample_num_1: u64,
    /// VRVI samples per pair in each inner round
    pub sample_num_2: u64,
    /// Iterations between checkpoints
    pub check_step: u64,
    /// Rollouts per policy evaluation
    pub test_max_episode: usize,
    /// Steps per evaluation rollout
    pub test_max_step: usize,
    /// Sailing: probability of being caught in a vortex
    pub probs: f64,
    /// Sailing: reward scale
    pub d: f64,
    /// Base seed; worker `i` derives its streams from `seed + i`
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::AsyncQvi,
            style: SampleStyle::Uniform,
            num_threads: 1,
            len_state: 0,
            len_action: 0,
            gamma: 0.99,
            epsilon: 0.0,
            explore: 0.3,
            alpha: 1.0,
            max_outer_iter: 1,
            max_inner_iter: 1,
            sample_num_1: 1,
            sample_num_2: 1,
            check_step: 1,
            test_max_episode: 100,
            test_max_step: 200,
            probs: 0.0,
            d: 0.05,
            seed: None,
        }
    }
}

impl RunConfig {
    /// Reject configurations the solvers cannot run meaningfully.
    ///
    /// Zero sample counts would turn every averaged backup into `NaN`, so
    /// they are refused here rather than propagated into the tables.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: u64) -> Result<()> {
            if value == 0 {
                return Err(DpError::Config(format!("{name} must be at least 1")));
            }
            Ok(())
        }

        if self.len_state == 0 {
            return Err(DpError::Config("len_state must be at least 1".into()));
        }
        if self.len_action == 0 {
            return Err(DpError::Config("len_action must be at least 1".into()));
        }
        if self.num_threads == 0 {
            return Err(DpError::Config("nthreads must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.gamma) {
            return Err(DpError::Config(format!(
                "gamma must lie in [0, 1), got {}",
                self.gamma
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(DpError::Config(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.explore) {
            return Err(DpError::Config(format!(
                "explore must lie in [0, 1], got {}",
                self.explore
            )));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(DpError::Config(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.probs) {
            return Err(DpError::Config(format!(
                "probs must lie in [0, 1], got {}",
                self.probs
            )));
        }
        positive("max_outer_iter", self.max_outer_iter)?;
        positive("max_inner_iter", self.max_inner_iter)?;
        positive("sample_num_1", self.sample_num_1)?;
        positive("sample_num_2", self.sample_num_2)?;
        positive("check_step", self.check_step)?;
        positive("test_max_episode", self.test_max_episode as u64)?;
        positive("test_max_step", self.test_max_step as u64)?;

        if self.style == SampleStyle::Markovian && self.algorithm != Algorithm::QLearning {
            return Err(DpError::Config(format!(
                "markovian sampling is only available for q-learning, not {}",
                self.algorithm
            )));
        }

        Ok(())
    }

    /// Seed for worker `worker_id`, if the run is seeded
    #[must_use]
    pub fn worker_seed(&self, worker_id: usize) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(worker_id as u64))
    }
}
