//! Probe selection shared by the async update rules

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use asyncdp_core::RunConfig;

/// Mixed into the run seed so probe streams differ from oracle streams
const PROBE_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Pair visited at counter value `n` by the cyclic sweep.
///
/// Actions vary fastest: `action = n mod A`, `state = (n div A) mod S`.
/// Every window of `S·A` consecutive counter values starting at a multiple
/// of `S·A` visits each pair exactly once.
#[inline]
#[must_use]
pub fn cyclic_pair(n: u64, len_state: usize, len_action: usize) -> (usize, usize) {
    let actions = len_action as u64;
    let state = (n / actions) % len_state as u64;
    let action = n % actions;
    (state as usize, action as usize)
}

/// Independent uniform draws of a state and an action
#[inline]
pub fn uniform_pair<R: Rng + ?Sized>(rng: &mut R, len_state: usize, len_action: usize) -> (usize, usize) {
    (rng.gen_range(0..len_state), rng.gen_range(0..len_action))
}

/// Probe-selection RNG owned by worker `worker_id`.
///
/// Seeded runs derive the stream from the run seed and the worker id;
/// unseeded runs draw from OS entropy. Never shared between workers.
#[must_use]
pub fn probe_rng(config: &RunConfig, worker_id: usize) -> StdRng {
    match config.worker_seed(worker_id) {
        Some(seed) => StdRng::seed_from_u64(seed ^ PROBE_STREAM),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn cyclic_window_covers_every_pair_once(
            len_state in 1usize..12,
            len_action in 1usize..9,
            window in 0u64..50,
        ) {
            let pairs = (len_state * len_action) as u64;
            let mut seen = vec![0u32; len_state * len_action];
            for n in window * pairs..(window + 1) * pairs {
                let (state, action) = cyclic_pair(n, len_state, len_action);
                prop_assert!(state < len_state && action < len_action);
                seen[state * len_action + action] += 1;
            }
            prop_assert!(seen.iter().all(|&count| count == 1));
        }
    }

    #[test]
    fn test_cyclic_order_is_round_robin() {
        let order: Vec<_> = (0..6).map(|n| cyclic_pair(n, 3, 2)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
        assert_eq!(cyclic_pair(6, 3, 2), (0, 0));
    }

    #[test]
    fn test_uniform_frequencies_approach_one_over_pairs() {
        let (len_state, len_action) = (5, 4);
        let draws = 200_000;
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = vec![0usize; len_state * len_action];
        for _ in 0..draws {
            let (state, action) = uniform_pair(&mut rng, len_state, len_action);
            counts[state * len_action + action] += 1;
        }
        let expected = 1.0 / (len_state * len_action) as f64;
        for count in counts {
            let frequency = count as f64 / f64::from(draws);
            assert!((frequency - expected).abs() < 0.005, "frequency {frequency}");
        }
    }

    #[test]
    fn test_probe_streams_are_per_worker() {
        let config = RunConfig {
            seed: Some(3),
            ..RunConfig::default()
        };
        let a: u64 = probe_rng(&config, 0).gen();
        let b: u64 = probe_rng(&config, 1).gen();
        let again: u64 = probe_rng(&config, 0).gen();
        assert_ne!(a, b);
        assert_eq!(a, again);
    }
}
