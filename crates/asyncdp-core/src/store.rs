//! Shared value, action-value and policy tables
//!
//! Every worker thread holds a reference to one [`SharedValueStore`]. Reads
//! are relaxed atomic loads and may observe a value that a concurrent writer
//! is about to replace; that staleness is accepted when choosing what to
//! sample next. All writes go through a single coarse write lock, which is
//! the only mutual exclusion in the whole table. The lock is held for a
//! compare-and-write only, never while sampling the oracle.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

/// `f64` cell readable without the write lock
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

fn zeroed(len: usize) -> Box<[AtomicF64]> {
    (0..len).map(|_| AtomicF64::new(0.0)).collect()
}

/// Value table V, optional action-value table Q and greedy policy table π.
///
/// All entries start at zero. V and π are only ever changed together by
/// [`StoreWriter::improve`], so under the write lock `π[s]` is always the
/// action that justified the last value written to `V[s]`.
#[derive(Debug)]
pub struct SharedValueStore {
    len_state: usize,
    len_action: usize,
    values: Box<[AtomicF64]>,
    policy: Box<[AtomicUsize]>,
    /// Row-major `len_state × len_action`, empty when not allocated
    action_values: Box<[AtomicF64]>,
    write_lock: Mutex<()>,
}

impl SharedValueStore {
    /// Allocate V and π for `len_state` states
    #[must_use]
    pub fn new(len_state: usize, len_action: usize) -> Self {
        Self {
            len_state,
            len_action,
            values: zeroed(len_state),
            policy: (0..len_state).map(|_| AtomicUsize::new(0)).collect(),
            action_values: Box::new([]),
            write_lock: Mutex::new(()),
        }
    }

    /// Allocate V, π and a `len_state × len_action` Q table
    #[must_use]
    pub fn with_action_values(len_state: usize, len_action: usize) -> Self {
        Self {
            action_values: zeroed(len_state * len_action),
            ..Self::new(len_state, len_action)
        }
    }

    /// Number of states
    #[must_use]
    pub fn len_state(&self) -> usize {
        self.len_state
    }

    /// Number of actions
    #[must_use]
    pub fn len_action(&self) -> usize {
        self.len_action
    }

    /// Whether a Q table was allocated
    #[must_use]
    pub fn has_action_values(&self) -> bool {
        !self.action_values.is_empty()
    }

    /// Relaxed read of `V[state]`.
    ///
    /// # Panics
    ///
    /// Panics if `state` is out of range.
    #[inline]
    #[must_use]
    pub fn read(&self, state: usize) -> f64 {
        self.values[state].load()
    }

    /// Relaxed read of `Q[state, action]`.
    ///
    /// # Panics
    ///
    /// Panics if the pair is out of range or no Q table was allocated.
    #[inline]
    #[must_use]
    pub fn read_action_value(&self, state: usize, action: usize) -> f64 {
        self.action_values[state * self.len_action + action].load()
    }

    /// Relaxed read of `π[state]`
    #[inline]
    #[must_use]
    pub fn policy_action(&self, state: usize) -> usize {
        self.policy[state].load(Ordering::Relaxed)
    }

    /// Take the write lock for a multi-step update
    pub fn lock(&self) -> StoreWriter<'_> {
        StoreWriter {
            store: self,
            _guard: self.write_lock.lock(),
        }
    }

    /// Replace `V[state]` and `π[state]` if `candidate` is strictly greater.
    ///
    /// Returns whether the tables changed. A `NaN` candidate never wins.
    pub fn compare_and_improve(&self, state: usize, candidate: f64, action: usize) -> bool {
        self.lock().improve(state, candidate, action)
    }

    /// Overwrite `Q[state, action]` under the write lock
    pub fn update_action_value(&self, state: usize, action: usize, value: f64) {
        self.lock().set_action_value(state, action, value);
    }

    /// `V[state]` and `π[state]` read together under the write lock
    #[must_use]
    pub fn consistent_entry(&self, state: usize) -> (f64, usize) {
        let writer = self.lock();
        (writer.value(state), writer.policy_action(state))
    }

    /// Copy of V
    #[must_use]
    pub fn values_snapshot(&self) -> Vec<f64> {
        self.values.iter().map(AtomicF64::load).collect()
    }

    /// Copy of π
    #[must_use]
    pub fn policy_snapshot(&self) -> Vec<usize> {
        self.policy
            .iter()
            .map(|action| action.load(Ordering::Relaxed))
            .collect()
    }

    /// Copy of Q, row-major; empty when no Q table was allocated
    #[must_use]
    pub fn action_values_snapshot(&self) -> Vec<f64> {
        self.action_values.iter().map(AtomicF64::load).collect()
    }
}

/// Exclusive access to the store for the lifetime of the guard
pub struct StoreWriter<'a> {
    store: &'a SharedValueStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreWriter<'_> {
    /// `V[state]`
    #[inline]
    #[must_use]
    pub fn value(&self, state: usize) -> f64 {
        self.store.read(state)
    }

    /// `π[state]`
    #[inline]
    #[must_use]
    pub fn policy_action(&self, state: usize) -> usize {
        self.store.policy_action(state)
    }

    /// `Q[state, action]`
    #[inline]
    #[must_use]
    pub fn action_value(&self, state: usize, action: usize) -> f64 {
        self.store.read_action_value(state, action)
    }

    /// Overwrite `Q[state, action]`
    #[inline]
    pub fn set_action_value(&mut self, state: usize, action: usize, value: f64) {
        self.store.action_values[state * self.store.len_action + action].store(value);
    }

    /// Compare-and-improve step: set `V[state] = candidate` and
    /// `π[state] = action` iff `candidate > V[state]`.
    #[inline]
    pub fn improve(&mut self, state: usize, candidate: f64, action: usize) -> bool {
        if candidate > self.store.values[state].load() {
            self.store.values[state].store(candidate);
            self.store.policy[state].store(action, Ordering::Relaxed);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_improve_only_on_strictly_greater() {
        let store = SharedValueStore::new(3, 2);
        assert!(store.compare_and_improve(1, 0.5, 1));
        assert!(!store.compare_and_improve(1, 0.5, 0));
        assert!(!store.compare_and_improve(1, 0.2, 0));
        assert!(!store.compare_and_improve(1, f64::NAN, 0));
        assert_eq!(store.consistent_entry(1), (0.5, 1));
        assert_eq!(store.values_snapshot(), vec![0.0, 0.5, 0.0]);
        assert_eq!(store.policy_snapshot(), vec![0, 1, 0]);
    }

    #[test]
    fn test_negative_candidates_do_not_beat_initial_zero() {
        let store = SharedValueStore::new(1, 1);
        assert!(!store.compare_and_improve(0, -1.0, 0));
        assert_eq!(store.read(0), 0.0);
    }

    #[test]
    fn test_action_values_share_the_write_lock() {
        let store = SharedValueStore::with_action_values(2, 3);
        assert!(store.has_action_values());
        store.update_action_value(1, 2, -4.0);
        assert_eq!(store.read_action_value(1, 2), -4.0);
        assert_eq!(store.action_values_snapshot()[5], -4.0);

        let mut writer = store.lock();
        writer.set_action_value(0, 0, 2.0);
        assert!(writer.improve(0, writer.action_value(0, 0), 0));
        drop(writer);
        assert_eq!(store.read(0), 2.0);
        assert!(!SharedValueStore::new(2, 3).has_action_values());
    }

    #[test]
    fn test_concurrent_improve_keeps_maximum() {
        const THREADS: usize = 8;
        const STEPS: usize = 2_000;

        let store = SharedValueStore::new(1, THREADS);
        let start = Barrier::new(THREADS);
        thread::scope(|scope| {
            for worker in 0..THREADS {
                let store = &store;
                let start = &start;
                scope.spawn(move || {
                    start.wait();
                    for step in 0..STEPS {
                        // Interleaved increasing sequences; worker w owns values w, w+T, w+2T...
                        let candidate = (step * THREADS + worker) as f64;
                        store.compare_and_improve(0, candidate, worker);
                    }
                });
            }
        });

        let best = ((STEPS - 1) * THREADS + THREADS - 1) as f64;
        assert_eq!(store.consistent_entry(0), (best, THREADS - 1));
    }

    #[test]
    fn test_values_never_decrease_under_contention() {
        let store = SharedValueStore::new(4, 2);
        thread::scope(|scope| {
            for worker in 0..4_usize {
                let store = &store;
                scope.spawn(move || {
                    for step in 0..1_000_usize {
                        let state = (step + worker) % 4;
                        let candidate = ((step * 7 + worker * 13) % 101) as f64;
                        store.compare_and_improve(state, candidate, worker % 2);
                    }
                });
            }
            scope.spawn(|| {
                let mut last = vec![0.0; 4];
                for _ in 0..5_000 {
                    for (state, previous) in last.iter_mut().enumerate() {
                        let current = store.read(state);
                        assert!(current >= *previous);
                        *previous = current;
                    }
                }
            });
        });
    }
}
