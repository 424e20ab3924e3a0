//! Sampling contract between the solvers and an environment

use serde::{Deserialize, Serialize};

use crate::Evaluation;

/// One sampled transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Index of the sampled successor state
    pub next_state: usize,
    /// Immediate reward
    pub reward: f64,
}

impl Transition {
    /// Create a new transition
    #[must_use]
    pub fn new(next_state: usize, reward: f64) -> Self {
        Self { next_state, reward }
    }
}

/// Generative model of an MDP.
///
/// Each worker owns its own oracle, so implementations keep their random
/// stream inside the instance and never share a generator across threads.
/// The solvers depend on nothing else about the environment.
pub trait SampleOracle: Send {
    /// Number of states S; valid state indices are `0..S`
    fn num_states(&self) -> usize;

    /// Number of actions A; valid action indices are `0..A`
    fn num_actions(&self) -> usize;

    /// Draw a successor state and reward for `(state, action)`
    fn sample(&mut self, state: usize, action: usize) -> Transition;

    /// Reward that marks reaching the goal in an evaluation rollout
    fn goal_reward(&self) -> f64 {
        1.0
    }

    /// Score a greedy policy (one action per state) by Monte-Carlo rollouts
    fn evaluate_policy(&mut self, policy: &[usize]) -> Evaluation;
}

impl<O: SampleOracle + ?Sized> SampleOracle for Box<O> {
    fn num_states(&self) -> usize {
        (**self).num_states()
    }

    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }

    fn sample(&mut self, state: usize, action: usize) -> Transition {
        (**self).sample(state, action)
    }

    fn goal_reward(&self) -> f64 {
        (**self).goal_reward()
    }

    fn evaluate_policy(&mut self, policy: &[usize]) -> Evaluation {
        (**self).evaluate_policy(policy)
    }
}
