//! Asynchronous Q-learning with greedy value tracking

use rand::rngs::StdRng;
use rand::Rng;

use asyncdp_core::{DpError, Evaluation, Result, SampleOracle, SampleStyle};

use crate::qvi::check_dimensions;
use crate::runner::{WorkerContext, WorkerRule};
use crate::sampling::{cyclic_pair, probe_rng, uniform_pair};
use crate::schedule::{PolynomialDecay, Schedule};

/// One asynchronous Q-learning worker.
///
/// Draws a single sample per iteration and blends it into `Q[s, a]` with a
/// decaying learning rate. V is not `max_a Q[s, ·]`: it only moves up when
/// the freshly written `Q[s, a]` beats it, and π follows the action that did
/// so. The whole read-blend-write-compare sequence runs under the store's
/// write lock.
pub struct AsyncQLearning<'a, O> {
    ctx: WorkerContext<'a>,
    oracle: O,
    rng: StdRng,
    schedule: Box<dyn Schedule>,
    /// Trajectory position for Markovian sampling
    next_state: usize,
}

impl<'a, O: SampleOracle> AsyncQLearning<'a, O> {
    /// Create a worker owning `oracle`, with `α_t = alpha · t^-0.51`
    pub fn new(ctx: WorkerContext<'a>, oracle: O) -> Result<Self> {
        if !ctx.store.has_action_values() {
            return Err(DpError::Config(
                "Q-learning needs a store with an action-value table".into(),
            ));
        }
        check_dimensions(&ctx, &oracle)?;

        Ok(Self {
            rng: probe_rng(ctx.config, ctx.worker_id),
            schedule: Box::new(PolynomialDecay::q_learning(ctx.config.alpha)),
            next_state: 0,
            ctx,
            oracle,
        })
    }

    /// Replace the learning-rate schedule
    #[must_use]
    pub fn with_schedule(mut self, schedule: impl Schedule + 'static) -> Self {
        self.schedule = Box::new(schedule);
        self
    }

    fn select(&mut self, iteration: u64) -> (usize, usize) {
        let store = self.ctx.store;
        match self.ctx.config.style {
            SampleStyle::Uniform => uniform_pair(&mut self.rng, store.len_state(), store.len_action()),
            SampleStyle::Cyclic => cyclic_pair(iteration, store.len_state(), store.len_action()),
            SampleStyle::Markovian => {
                let state = self.next_state;
                let action = if self.rng.gen::<f64>() < self.ctx.config.explore {
                    self.rng.gen_range(0..store.len_action())
                } else {
                    store.policy_action(state)
                };
                (state, action)
            }
        }
    }
}

impl<O: SampleOracle> WorkerRule for AsyncQLearning<'_, O> {
    fn update(&mut self, iteration: u64) {
        let (state, action) = self.select(iteration);
        let transition = self.oracle.sample(state, action);
        self.next_state = transition.next_state;

        let gamma = self.ctx.config.gamma;
        let mut writer = self.ctx.store.lock();
        let alpha = self.schedule.value(iteration);
        self.ctx.control.record_learning_rate(&writer, alpha);

        let target = transition.reward + gamma * writer.value(transition.next_state);
        let blended = (1.0 - alpha) * writer.action_value(state, action) + alpha * target;
        writer.set_action_value(state, action, blended);
        writer.improve(state, blended, action);
    }

    fn evaluate(&mut self, policy: &[usize]) -> Evaluation {
        self.oracle.evaluate_policy(policy)
    }
}
