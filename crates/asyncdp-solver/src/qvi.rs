//! Asynchronous monotone Q-value iteration

use rand::rngs::StdRng;

use asyncdp_core::{DpError, Evaluation, Result, SampleOracle, SampleStyle};

use crate::runner::{WorkerContext, WorkerRule};
use crate::sampling::{cyclic_pair, probe_rng, uniform_pair};

/// One AsyncQVI worker.
///
/// Each iteration picks a `(state, action)` pair, averages
/// `max_inner_iter` sampled backups `r + γ·V[next]`, subtracts the bias
/// `(1-γ)·ε/4` and offers the result to the store. With rewards that keep
/// the optimal values non-negative, the biased estimate stays below the
/// fixed point with high probability, so V only ever climbs towards it.
pub struct AsyncQvi<'a, O> {
    ctx: WorkerContext<'a>,
    oracle: O,
    rng: StdRng,
    bias: f64,
}

impl<'a, O: SampleOracle> AsyncQvi<'a, O> {
    /// Create a worker owning `oracle`
    pub fn new(ctx: WorkerContext<'a>, oracle: O) -> Result<Self> {
        let config = ctx.config;
        if config.style == SampleStyle::Markovian {
            return Err(DpError::Config(
                "AsyncQVI supports uniform and cyclic sampling only".into(),
            ));
        }
        check_dimensions(&ctx, &oracle)?;

        Ok(Self {
            rng: probe_rng(config, ctx.worker_id),
            bias: (1.0 - config.gamma) * config.epsilon / 4.0,
            ctx,
            oracle,
        })
    }

    /// Pair probed at counter value `iteration`
    fn select(&mut self, iteration: u64) -> (usize, usize) {
        let store = self.ctx.store;
        match self.ctx.config.style {
            SampleStyle::Cyclic => cyclic_pair(iteration, store.len_state(), store.len_action()),
            _ => uniform_pair(&mut self.rng, store.len_state(), store.len_action()),
        }
    }

    /// Biased sample-average backup for `(state, action)` against the current V
    pub fn backup(&mut self, state: usize, action: usize) -> f64 {
        let gamma = self.ctx.config.gamma;
        let samples = self.ctx.config.max_inner_iter;
        let mut total = 0.0;
        for _ in 0..samples {
            let transition = self.oracle.sample(state, action);
            total += transition.reward + gamma * self.ctx.store.read(transition.next_state);
        }
        total / samples as f64 - self.bias
    }
}

impl<O: SampleOracle> WorkerRule for AsyncQvi<'_, O> {
    fn update(&mut self, iteration: u64) {
        let (state, action) = self.select(iteration);
        let estimate = self.backup(state, action);
        self.ctx.store.compare_and_improve(state, estimate, action);
    }

    fn evaluate(&mut self, policy: &[usize]) -> Evaluation {
        self.oracle.evaluate_policy(policy)
    }
}

/// The oracle must describe the same state and action spaces as the store
pub(crate) fn check_dimensions<O: SampleOracle>(ctx: &WorkerContext<'_>, oracle: &O) -> Result<()> {
    let store = ctx.store;
    if oracle.num_states() != store.len_state() {
        return Err(DpError::DimensionMismatch {
            expected: store.len_state(),
            actual: oracle.num_states(),
        });
    }
    if oracle.num_actions() != store.len_action() {
        return Err(DpError::DimensionMismatch {
            expected: store.len_action(),
            actual: oracle.num_actions(),
        });
    }
    Ok(())
}
