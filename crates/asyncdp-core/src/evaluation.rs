//! Monte-Carlo policy evaluation

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{RunConfig, SampleOracle};

/// Rollout budget for a policy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    /// Discount applied to rollout rewards
    pub gamma: f64,
    /// Number of independent rollouts
    pub episodes: usize,
    /// Steps per rollout
    pub max_steps: usize,
}

impl EvaluationSettings {
    /// Evaluation budget taken from the run configuration
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            gamma: config.gamma,
            episodes: config.test_max_episode,
            max_steps: config.test_max_step,
        }
    }
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Wall-clock time spent evaluating
    pub elapsed: Duration,
    /// Discounted return averaged over rollouts
    pub average_return: f64,
    /// Rollouts that received the goal reward at least once
    pub goal_reached: usize,
}

/// Run `settings.episodes` rollouts of `policy` on `oracle`.
///
/// Each rollout starts in a state drawn uniformly with `rng` and follows
/// `policy` for `settings.max_steps` steps, accumulating `γ^t · r`.
pub fn monte_carlo<O, R>(
    oracle: &mut O,
    policy: &[usize],
    settings: &EvaluationSettings,
    rng: &mut R,
) -> Evaluation
where
    O: SampleOracle + ?Sized,
    R: Rng + ?Sized,
{
    let started = Instant::now();
    let goal = oracle.goal_reward();
    let num_states = oracle.num_states();

    let mut total_return = 0.0;
    let mut goal_reached = 0;
    for _ in 0..settings.episodes {
        let mut state = rng.gen_range(0..num_states);
        let mut discount = 1.0;
        let mut reached = false;
        for _ in 0..settings.max_steps {
            let transition = oracle.sample(state, policy[state]);
            total_return += discount * transition.reward;
            discount *= settings.gamma;
            if transition.reward == goal {
                reached = true;
            }
            state = transition.next_state;
        }
        if reached {
            goal_reached += 1;
        }
    }

    let average_return = if settings.episodes == 0 {
        0.0
    } else {
        total_return / settings.episodes as f64
    };

    Evaluation {
        elapsed: started.elapsed(),
        average_return,
        goal_reached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transition;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Every state moves to state 1, which pays the goal reward
    struct Funnel;

    impl SampleOracle for Funnel {
        fn num_states(&self) -> usize {
            2
        }

        fn num_actions(&self) -> usize {
            1
        }

        fn sample(&mut self, _state: usize, _action: usize) -> Transition {
            Transition::new(1, 1.0)
        }

        fn evaluate_policy(&mut self, policy: &[usize]) -> Evaluation {
            let settings = EvaluationSettings {
                gamma: 0.5,
                episodes: 4,
                max_steps: 3,
            };
            monte_carlo(self, policy, &settings, &mut StdRng::seed_from_u64(0))
        }
    }

    #[test]
    fn test_discounted_return_and_goal_count() {
        let evaluation = Funnel.evaluate_policy(&[0, 0]);
        assert_relative_eq!(evaluation.average_return, 1.0 + 0.5 + 0.25);
        assert_eq!(evaluation.goal_reached, 4);
    }

    #[test]
    fn test_zero_episodes() {
        let settings = EvaluationSettings {
            episodes: 0,
            ..EvaluationSettings::default()
        };
        let evaluation = monte_carlo(&mut Funnel, &[0, 0], &settings, &mut rand::thread_rng());
        assert_eq!(evaluation.average_return, 0.0);
        assert_eq!(evaluation.goal_reached, 0);
    }
}
