//! Variance-reduced value iteration

use ndarray::{Array1, Array2, ArrayView1};

use asyncdp_core::{CheckpointLog, DpError, Result, RunConfig, SampleOracle};

/// State of the inner value table after one inner round
#[derive(Debug, Clone, Copy)]
pub struct InnerRound<'a> {
    /// Outer iteration, from 0
    pub outer: u64,
    /// Inner round within the outer iteration, from 0
    pub round: u64,
    /// Inner value table after the round
    pub values: ArrayView1<'a, f64>,
}

/// Single-threaded variance-reduced value iteration.
///
/// Each outer iteration first estimates the recentering term
/// `x[s, a] = mean(γ · v_outer[next])` with `sample_num_1` samples per pair.
/// It then runs `max_inner_iter` monotone rounds that estimate only the
/// difference `r + γ(v_inner[next] - v_outer[next])` with `sample_num_2`
/// samples and add `x[s, a]` back. `v_inner` carries over between rounds and
/// outer iterations; `v_outer` is replaced by it after each outer iteration.
///
/// Every loop runs state-major, action-minor, sample innermost, so two
/// solvers with identically seeded oracles produce bit-identical tables.
#[derive(Debug)]
pub struct Vrvi<O> {
    config: RunConfig,
    oracle: O,
    baseline: Array2<f64>,
    v_outer: Array1<f64>,
    v_inner: Array1<f64>,
    policy: Vec<usize>,
}

impl<O: SampleOracle> Vrvi<O> {
    /// Create a solver with zeroed tables
    pub fn new(config: &RunConfig, oracle: O) -> Result<Self> {
        if oracle.num_states() != config.len_state {
            return Err(DpError::DimensionMismatch {
                expected: config.len_state,
                actual: oracle.num_states(),
            });
        }
        if oracle.num_actions() != config.len_action {
            return Err(DpError::DimensionMismatch {
                expected: config.len_action,
                actual: oracle.num_actions(),
            });
        }

        let (states, actions) = (config.len_state, config.len_action);
        Ok(Self {
            config: config.clone(),
            oracle,
            baseline: Array2::zeros((states, actions)),
            v_outer: Array1::zeros(states),
            v_inner: Array1::zeros(states),
            policy: vec![0; states],
        })
    }

    /// Run every outer iteration and return how many ran
    pub fn solve(&mut self, log: &CheckpointLog) -> Result<u64> {
        self.solve_with(log, |_| {})
    }

    /// Like [`solve`](Self::solve), calling `observer` after every inner round
    pub fn solve_with<F>(&mut self, log: &CheckpointLog, mut observer: F) -> Result<u64>
    where
        F: FnMut(InnerRound<'_>),
    {
        let outer_iterations = self.config.max_outer_iter;
        for outer in 0..outer_iterations {
            self.recenter();
            for round in 0..self.config.max_inner_iter {
                self.inner_round();
                observer(InnerRound {
                    outer,
                    round,
                    values: self.v_inner.view(),
                });
            }
            self.v_outer.assign(&self.v_inner);

            if outer % self.config.check_step == 0 {
                let evaluation = self.oracle.evaluate_policy(&self.policy);
                log.record(outer, &evaluation)?;
            }
        }
        Ok(outer_iterations)
    }

    /// Re-estimate `x[s, a] = mean(γ · v_outer[next])`
    pub fn recenter(&mut self) {
        let gamma = self.config.gamma;
        let samples = self.config.sample_num_1;
        for ((state, action), x) in self.baseline.indexed_iter_mut() {
            let mut total = 0.0;
            for _ in 0..samples {
                let transition = self.oracle.sample(state, action);
                total += gamma * self.v_outer[transition.next_state];
            }
            *x = total / samples as f64;
        }
    }

    /// One monotone pass over every `(state, action)` pair
    pub fn inner_round(&mut self) {
        let gamma = self.config.gamma;
        let samples = self.config.sample_num_2;
        for state in 0..self.config.len_state {
            for action in 0..self.config.len_action {
                let mut total = 0.0;
                for _ in 0..samples {
                    let transition = self.oracle.sample(state, action);
                    let next = transition.next_state;
                    total += transition.reward + gamma * (self.v_inner[next] - self.v_outer[next]);
                }
                let estimate = total / samples as f64 + self.baseline[[state, action]];
                if estimate > self.v_inner[state] {
                    self.v_inner[state] = estimate;
                    self.policy[state] = action;
                }
            }
        }
    }

    /// Inner value table, which is also the final estimate
    #[must_use]
    pub fn values(&self) -> &Array1<f64> {
        &self.v_inner
    }

    /// Greedy policy
    #[must_use]
    pub fn policy(&self) -> &[usize] {
        &self.policy
    }

    /// Recentering term `x` of the current outer iteration
    #[must_use]
    pub fn baseline(&self) -> &Array2<f64> {
        &self.baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use asyncdp_core::{Algorithm, Transition};
    use asyncdp_env::{SailingOracle, TabularOracle};

    fn two_state() -> TabularOracle {
        TabularOracle::from_fn(2, 2, |state, action| match (state, action) {
            (0, 0) => Transition::new(0, 0.0),
            (0, 1) => Transition::new(1, 0.5),
            (1, 0) => Transition::new(1, 1.0),
            (_, _) => Transition::new(0, 0.2),
        })
        .unwrap()
    }

    fn tabular_config() -> RunConfig {
        RunConfig {
            algorithm: Algorithm::Vrvi,
            len_state: 2,
            len_action: 2,
            gamma: 0.9,
            max_outer_iter: 40,
            max_inner_iter: 5,
            sample_num_1: 2,
            sample_num_2: 2,
            check_step: 10,
            ..RunConfig::default()
        }
    }

    fn sailing_config() -> RunConfig {
        RunConfig {
            algorithm: Algorithm::Vrvi,
            len_state: 8 * 5 * 5,
            len_action: 8,
            gamma: 0.9,
            probs: 0.1,
            max_outer_iter: 3,
            max_inner_iter: 3,
            sample_num_1: 4,
            sample_num_2: 2,
            check_step: 1,
            test_max_episode: 5,
            test_max_step: 20,
            seed: Some(21),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_recenter_averages_discounted_outer_values() {
        let config = tabular_config();
        let mut solver = Vrvi::new(&config, two_state()).unwrap();
        solver.v_outer = Array1::from(vec![1.0, 3.0]);
        solver.recenter();
        assert_abs_diff_eq!(solver.baseline()[[0, 0]], 0.9);
        assert_abs_diff_eq!(solver.baseline()[[0, 1]], 2.7);
        assert_abs_diff_eq!(solver.baseline()[[1, 1]], 0.9);
    }

    #[test]
    fn test_converges_on_deterministic_mdp() {
        let config = tabular_config();
        let (optimal, optimal_policy) = two_state().value_iteration(0.9, 1e-12, 10_000);
        let mut solver = Vrvi::new(&config, two_state()).unwrap();
        let log = CheckpointLog::silent();
        assert_eq!(solver.solve(&log).unwrap(), 40);

        for (value, target) in solver.values().iter().zip(&optimal) {
            assert_abs_diff_eq!(*value, *target, epsilon = 1e-3);
        }
        assert_eq!(solver.policy(), optimal_policy.as_slice());

        let logged: Vec<u64> = log.checkpoints().iter().map(|c| c.iteration).collect();
        assert_eq!(logged, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_inner_values_never_decrease() {
        let config = sailing_config();
        let oracle = SailingOracle::for_worker(&config, 0).unwrap();
        let mut solver = Vrvi::new(&config, oracle).unwrap();
        let mut previous = Array1::<f64>::zeros(config.len_state);
        let mut rounds = 0;
        solver
            .solve_with(&CheckpointLog::silent(), |round| {
                for (now, before) in round.values.iter().zip(previous.iter()) {
                    assert!(now >= before);
                }
                previous.assign(&round.values);
                rounds += 1;
            })
            .unwrap();
        assert_eq!(rounds, 9);
    }

    #[test]
    fn test_seeded_runs_are_bit_identical() {
        let config = sailing_config();
        let run = || {
            let oracle = SailingOracle::for_worker(&config, 0).unwrap();
            let mut solver = Vrvi::new(&config, oracle).unwrap();
            let log = CheckpointLog::silent();
            solver.solve(&log).unwrap();
            let bits: Vec<u64> = solver.values().iter().map(|v| v.to_bits()).collect();
            (bits, solver.policy().to_vec(), log.checkpoints())
        };

        let (first_values, first_policy, first_log) = run();
        let (second_values, second_policy, second_log) = run();
        assert_eq!(first_values, second_values);
        assert_eq!(first_policy, second_policy);
        let returns = |log: &[asyncdp_core::Checkpoint]| {
            log.iter().map(|c| c.average_return.to_bits()).collect::<Vec<_>>()
        };
        assert_eq!(returns(&first_log), returns(&second_log));
    }

    #[test]
    fn test_rejects_mismatched_oracle() {
        let config = RunConfig {
            len_state: 3,
            ..tabular_config()
        };
        assert!(matches!(
            Vrvi::new(&config, two_state()),
            Err(DpError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
