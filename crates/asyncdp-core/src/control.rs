//! Run-control record mutated at checkpoints

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::StoreWriter;

/// Mutable control state shared by the worker pool.
///
/// The iteration counter is bumped lock-free by every worker. The checkpoint
/// threshold and the stop flag are written only by the elected worker while
/// every other worker is parked between the two checkpoint barriers, and read
/// with relaxed loads elsewhere: both change monotonically, so a stale read
/// can only delay a checkpoint or a stop, never corrupt one.
#[derive(Debug)]
pub struct ControlState {
    iteration: AtomicU64,
    threshold: AtomicU64,
    stop: AtomicBool,
    learning_rate: AtomicU64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    /// Counter starts at 1, threshold at 0 so the first iteration checkpoints
    #[must_use]
    pub fn new() -> Self {
        Self {
            iteration: AtomicU64::new(1),
            threshold: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            learning_rate: AtomicU64::new(1.0_f64.to_bits()),
        }
    }

    /// Current value of the global iteration counter
    #[inline]
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::Relaxed)
    }

    /// Count one completed worker iteration, returning the new counter value
    #[inline]
    pub fn complete_iteration(&self) -> u64 {
        self.iteration.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Counter value past which the next checkpoint fires
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> u64 {
        self.threshold.load(Ordering::Relaxed)
    }

    /// Whether `iteration` has moved past the checkpoint threshold
    #[inline]
    #[must_use]
    pub fn checkpoint_due(&self, iteration: u64) -> bool {
        iteration > self.threshold()
    }

    /// Move the threshold forward by `step`. Checkpoint-only.
    pub fn advance_threshold(&self, step: u64) -> u64 {
        self.threshold.fetch_add(step, Ordering::AcqRel) + step
    }

    /// Whether workers should leave their loops
    #[inline]
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Raise the stop flag. It is never cleared.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Publish the learning rate used by the latest Q-learning update.
    ///
    /// Takes the store writer so the rate can only be written inside the
    /// same locked region as the Q update it belongs to.
    pub fn record_learning_rate(&self, _writer: &StoreWriter<'_>, alpha: f64) {
        self.learning_rate.store(alpha.to_bits(), Ordering::Relaxed);
    }

    /// Learning rate of the latest Q-learning update, for reporting only
    #[must_use]
    pub fn last_learning_rate(&self) -> f64 {
        f64::from_bits(self.learning_rate.load(Ordering::Relaxed))
    }
}
