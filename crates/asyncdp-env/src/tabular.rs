//! Deterministic tabular MDP

use rand::rngs::StdRng;
use rand::SeedableRng;

use asyncdp_core::{
    monte_carlo, DpError, Evaluation, EvaluationSettings, Result, SampleOracle, Transition,
};

/// Oracle backed by a fixed `(next_state, reward)` table.
///
/// `sample` involves no randomness at all; only the start states of
/// evaluation rollouts are drawn, from a fixed seed.
#[derive(Debug, Clone)]
pub struct TabularOracle {
    num_states: usize,
    num_actions: usize,
    /// Row-major `num_states × num_actions`
    table: Vec<Transition>,
    evaluation: EvaluationSettings,
    evaluation_seed: u64,
}

impl TabularOracle {
    /// Create an oracle from a row-major transition table
    pub fn new(num_states: usize, num_actions: usize, table: Vec<Transition>) -> Result<Self> {
        if num_states == 0 || num_actions == 0 {
            return Err(DpError::Environment(
                "tabular oracle needs at least one state and one action".into(),
            ));
        }
        if table.len() != num_states * num_actions {
            return Err(DpError::DimensionMismatch {
                expected: num_states * num_actions,
                actual: table.len(),
            });
        }
        if let Some(bad) = table.iter().find(|t| t.next_state >= num_states) {
            return Err(DpError::InvalidState {
                state: bad.next_state,
                len: num_states,
            });
        }

        tracing::debug!(num_states, num_actions, "Created tabular oracle");
        Ok(Self {
            num_states,
            num_actions,
            table,
            evaluation: EvaluationSettings::default(),
            evaluation_seed: 0,
        })
    }

    /// Build the table from a function of `(state, action)`
    pub fn from_fn<F>(num_states: usize, num_actions: usize, transition: F) -> Result<Self>
    where
        F: Fn(usize, usize) -> Transition,
    {
        let table = (0..num_states)
            .flat_map(|state| (0..num_actions).map(move |action| (state, action)))
            .map(|(state, action)| transition(state, action))
            .collect();
        Self::new(num_states, num_actions, table)
    }

    /// Set the rollout budget used by `evaluate_policy`
    #[must_use]
    pub fn with_evaluation(mut self, evaluation: EvaluationSettings) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Seed for the start states of evaluation rollouts
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.evaluation_seed = seed;
        self
    }

    /// Exact transition for `(state, action)`
    #[must_use]
    pub fn transition(&self, state: usize, action: usize) -> Transition {
        self.table[state * self.num_actions + action]
    }

    /// Optimal values and a greedy policy by synchronous value iteration.
    ///
    /// Stops once the largest change in a sweep drops below `tolerance` or
    /// after `max_sweeps` sweeps.
    #[must_use]
    pub fn value_iteration(
        &self,
        gamma: f64,
        tolerance: f64,
        max_sweeps: usize,
    ) -> (Vec<f64>, Vec<usize>) {
        let mut values = vec![0.0; self.num_states];
        let mut policy = vec![0; self.num_states];
        for _ in 0..max_sweeps {
            let mut delta: f64 = 0.0;
            let previous = values.clone();
            for state in 0..self.num_states {
                let (best_action, best_value) = (0..self.num_actions)
                    .map(|action| {
                        let t = self.transition(state, action);
                        (action, t.reward + gamma * previous[t.next_state])
                    })
                    .fold((0, f64::NEG_INFINITY), |best, candidate| {
                        if candidate.1 > best.1 {
                            candidate
                        } else {
                            best
                        }
                    });
                delta = delta.max((best_value - previous[state]).abs());
                values[state] = best_value;
                policy[state] = best_action;
            }
            if delta < tolerance {
                break;
            }
        }
        (values, policy)
    }
}

impl SampleOracle for TabularOracle {
    fn num_states(&self) -> usize {
        self.num_states
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn sample(&mut self, state: usize, action: usize) -> Transition {
        self.transition(state, action)
    }

    fn evaluate_policy(&mut self, policy: &[usize]) -> Evaluation {
        let mut starts = StdRng::seed_from_u64(self.evaluation_seed);
        let settings = self.evaluation.clone();
        monte_carlo(self, policy, &settings, &mut starts)
    }
}
