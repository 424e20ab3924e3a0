//! Sailing problem: steer a boat to the centre of a windy grid

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use asyncdp_core::{
    monte_carlo, DpError, Evaluation, EvaluationSettings, Result, RunConfig, SampleOracle,
    Transition,
};

/// Number of wind directions, which is also the number of headings
pub const WIND_DIRECTIONS: usize = 8;

/// Wind direction transition matrix; row = current wind, column = next wind
const WIND_TRANSITION: [[f64; WIND_DIRECTIONS]; WIND_DIRECTIONS] = [
    [0.3, 0.2, 0.1, 0.04, 0.02, 0.04, 0.1, 0.2],
    [0.2, 0.3, 0.2, 0.1, 0.04, 0.02, 0.04, 0.1],
    [0.1, 0.2, 0.3, 0.2, 0.1, 0.04, 0.02, 0.04],
    [0.04, 0.1, 0.2, 0.3, 0.2, 0.1, 0.04, 0.02],
    [0.02, 0.04, 0.1, 0.2, 0.3, 0.2, 0.1, 0.04],
    [0.04, 0.02, 0.04, 0.1, 0.2, 0.3, 0.2, 0.1],
    [0.1, 0.04, 0.02, 0.04, 0.1, 0.2, 0.3, 0.2],
    [0.2, 0.1, 0.04, 0.02, 0.04, 0.1, 0.2, 0.3],
];

/// Heading for each action, clockwise from north
const HEADINGS: [(i64, i64); WIND_DIRECTIONS] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Configuration of a sailing oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SailingConfig {
    /// Number of states, `8 · side²`
    pub len_state: usize,
    /// Probability of being caught in a vortex on each move
    pub vortex_probability: f64,
    /// Reward per unit of angle between heading and wind
    pub reward_scale: f64,
    /// Rollout budget for policy evaluation
    pub evaluation: EvaluationSettings,
    /// Random seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl SailingConfig {
    /// Oracle configuration for worker `worker_id` of a run
    #[must_use]
    pub fn for_worker(config: &RunConfig, worker_id: usize) -> Self {
        Self {
            len_state: config.len_state,
            vortex_probability: config.probs,
            reward_scale: config.d,
            evaluation: EvaluationSettings::from_config(config),
            seed: config.worker_seed(worker_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boat {
    x: i64,
    y: i64,
    wind: usize,
}

/// Sample oracle for the sailing problem.
///
/// A state is a grid position plus one of eight wind directions, encoded as
/// `wind · side² + x · side + y`. The goal sits at the grid centre.
#[derive(Debug, Clone)]
pub struct SailingOracle {
    side: i64,
    goal: (i64, i64),
    config: SailingConfig,
    rng: StdRng,
    evaluation_seed: u64,
    drift: Normal<f64>,
    vortex: Normal<f64>,
}

impl SailingOracle {
    /// Create a new sailing oracle
    pub fn new(config: SailingConfig) -> Result<Self> {
        let side = grid_side(config.len_state)?;
        if !(0.0..=1.0).contains(&config.vortex_probability) {
            return Err(DpError::Environment(format!(
                "vortex probability must lie in [0, 1], got {}",
                config.vortex_probability
            )));
        }
        let drift = Normal::new(0.0, 0.1).map_err(|e| DpError::Environment(e.to_string()))?;
        let vortex = Normal::new(0.0, 1.0).map_err(|e| DpError::Environment(e.to_string()))?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let evaluation_seed = rng.gen();
        tracing::debug!(
            side,
            states = config.len_state,
            seeded = config.seed.is_some(),
            "Created sailing oracle"
        );

        Ok(Self {
            side,
            goal: (side / 2, side / 2),
            config,
            rng,
            evaluation_seed,
            drift,
            vortex,
        })
    }

    /// Oracle for worker `worker_id`, checking that the action space matches
    pub fn for_worker(config: &RunConfig, worker_id: usize) -> Result<Self> {
        if config.len_action != WIND_DIRECTIONS {
            return Err(DpError::Environment(format!(
                "the sailing problem has {WIND_DIRECTIONS} actions, len_action is {}",
                config.len_action
            )));
        }
        Self::new(SailingConfig::for_worker(config, worker_id))
    }

    /// Grid side length
    #[must_use]
    pub fn side(&self) -> usize {
        self.side as usize
    }

    /// State index of the goal cell under the given wind
    #[must_use]
    pub fn goal_state(&self, wind: usize) -> usize {
        self.encode(Boat {
            x: self.goal.0,
            y: self.goal.1,
            wind,
        })
    }

    fn decode(&self, index: usize) -> Boat {
        let cells = (self.side * self.side) as usize;
        let wind = index / cells;
        let cell = (index % cells) as i64;
        Boat {
            x: cell / self.side,
            y: cell % self.side,
            wind,
        }
    }

    fn encode(&self, boat: Boat) -> usize {
        boat.wind * (self.side * self.side) as usize + (boat.x * self.side + boat.y) as usize
    }

    fn clamp(&self, coordinate: i64) -> i64 {
        coordinate.clamp(0, self.side - 1)
    }

    fn sail(&mut self, boat: &mut Boat, action: usize) {
        let (dx, dy) = HEADINGS.get(action).copied().unwrap_or((-1, -1));
        boat.x = self.clamp(boat.x + dx);
        boat.y = self.clamp(boat.y + dy);

        // positioning noise, truncated toward zero
        let (nx, ny) = (self.noise(self.drift), self.noise(self.drift));
        boat.x = self.clamp(boat.x + nx);
        boat.y = self.clamp(boat.y + ny);

        if self.rng.gen::<f64>() < self.config.vortex_probability {
            let (nx, ny) = (self.noise(self.vortex), self.noise(self.vortex));
            boat.x = self.clamp(boat.x + nx);
            boat.y = self.clamp(boat.y + ny);
        }
    }

    fn noise(&mut self, distribution: Normal<f64>) -> i64 {
        distribution.sample(&mut self.rng) as i64
    }

    fn reward(&self, boat: Boat, action: usize) -> f64 {
        if (boat.x, boat.y) == self.goal {
            return 1.0;
        }
        if boat.x == 0 && boat.y == 0 {
            return 0.0;
        }
        let angle = action.abs_diff(boat.wind);
        let angle = angle.min(WIND_DIRECTIONS - angle);
        angle as f64 * self.config.reward_scale
    }

    fn shift_wind(&mut self, boat: &mut Boat) {
        let draw: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for (next, probability) in WIND_TRANSITION[boat.wind].iter().enumerate() {
            cumulative += probability;
            if cumulative > draw {
                boat.wind = next;
                return;
            }
        }
    }
}

impl SampleOracle for SailingOracle {
    fn num_states(&self) -> usize {
        self.config.len_state
    }

    fn num_actions(&self) -> usize {
        WIND_DIRECTIONS
    }

    fn sample(&mut self, state: usize, action: usize) -> Transition {
        let mut boat = self.decode(state);
        self.sail(&mut boat, action);
        let reward = self.reward(boat, action);
        self.shift_wind(&mut boat);
        Transition::new(self.encode(boat), reward)
    }

    /// Rollouts run on a copy reseeded from a fixed evaluation seed, so the
    /// training stream is untouched and repeated calls score the same policy
    /// identically.
    fn evaluate_policy(&mut self, policy: &[usize]) -> Evaluation {
        let mut probe = self.clone();
        probe.rng = StdRng::seed_from_u64(self.evaluation_seed);
        let mut starts = StdRng::seed_from_u64(self.evaluation_seed.wrapping_add(1));
        let settings = self.config.evaluation.clone();
        monte_carlo(&mut probe, policy, &settings, &mut starts)
    }
}

/// Side of the square grid holding `len_state / 8` cells
fn grid_side(len_state: usize) -> Result<i64> {
    let cells = len_state / WIND_DIRECTIONS;
    let side = (cells as f64).sqrt().round() as usize;
    if len_state == 0 || len_state % WIND_DIRECTIONS != 0 || side * side != cells {
        return Err(DpError::Environment(format!(
            "sailing needs len_state = 8 · side², got {len_state}"
        )));
    }
    Ok(side as i64)
}
