//! Fixed worker pool with barrier-synchronized checkpoints

use std::panic::{self, AssertUnwindSafe};
use std::sync::Barrier;
use std::thread;

use parking_lot::Mutex;

use asyncdp_core::{
    CheckpointLog, ControlState, DpError, Evaluation, Result, RunConfig, SharedValueStore,
};

/// Per-iteration logic run by one worker thread
pub trait WorkerRule: Send {
    /// Perform one iteration; `iteration` is the global counter read at loop entry
    fn update(&mut self, iteration: u64);

    /// Score a policy snapshot with this worker's oracle
    fn evaluate(&mut self, policy: &[usize]) -> Evaluation;
}

/// Everything a worker shares with the rest of the pool
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    /// Worker index; worker 0 runs the checkpoints
    pub worker_id: usize,
    /// Immutable run configuration
    pub config: &'a RunConfig,
    /// Shared tables
    pub store: &'a SharedValueStore,
    /// Counter, threshold and stop flag
    pub control: &'a ControlState,
}

/// Runs one [`WorkerRule`] per OS thread until the iteration budget is spent.
///
/// Each worker loops: update, bump the counter, and if the counter has
/// passed the checkpoint threshold, rendezvous at a barrier. Between the two
/// barrier waits worker 0 evaluates the policy, logs it, advances the
/// threshold and decides whether to stop; the others stay parked, so
/// nobody writes to the store while it is being read for evaluation. The
/// stop flag is only checked at the top of the loop.
///
/// A panic inside a worker's update or evaluation is caught; the worker
/// keeps attending checkpoints, the next checkpoint stops the run, and
/// `run` returns [`DpError::WorkerPanicked`].
pub struct AsyncRunner<'a> {
    config: &'a RunConfig,
    store: &'a SharedValueStore,
    log: &'a CheckpointLog,
    control: ControlState,
    failure: Mutex<Option<DpError>>,
}

impl<'a> AsyncRunner<'a> {
    /// Create a runner over `store`
    #[must_use]
    pub fn new(config: &'a RunConfig, store: &'a SharedValueStore, log: &'a CheckpointLog) -> Self {
        Self {
            config,
            store,
            log,
            control: ControlState::new(),
            failure: Mutex::new(None),
        }
    }

    /// Control record of this run
    #[must_use]
    pub fn control(&self) -> &ControlState {
        &self.control
    }

    /// Build `num_threads` workers with `make_worker`, run them to completion
    /// and return the final iteration counter.
    ///
    /// Every worker is constructed before any thread starts, so a
    /// construction error leaves nothing running.
    pub fn run<'s, R, F>(&'s self, make_worker: F) -> Result<u64>
    where
        R: WorkerRule,
        F: Fn(WorkerContext<'s>) -> Result<R>,
    {
        let workers = (0..self.config.num_threads)
            .map(|worker_id| {
                make_worker(WorkerContext {
                    worker_id,
                    config: self.config,
                    store: self.store,
                    control: &self.control,
                })
            })
            .collect::<Result<Vec<R>>>()?;

        let barrier = Barrier::new(workers.len());
        let outcomes: Vec<bool> = thread::scope(|scope| {
            let handles: Vec<_> = workers
                .into_iter()
                .enumerate()
                .map(|(worker_id, worker)| {
                    let barrier = &barrier;
                    scope.spawn(move || self.drive(worker_id, worker, barrier))
                })
                .collect();
            handles.into_iter().map(|h| h.join().is_ok()).collect()
        });

        if let Some(worker_id) = outcomes.iter().position(|ok| !ok) {
            return Err(DpError::WorkerPanicked(worker_id));
        }
        if let Some(err) = self.failure.lock().take() {
            return Err(err);
        }
        Ok(self.control.iteration())
    }

    fn drive<R: WorkerRule>(&self, worker_id: usize, mut worker: R, barrier: &Barrier) {
        let _span = tracing::debug_span!("worker", id = worker_id).entered();
        tracing::debug!("Worker started");

        let mut healthy = true;
        while !self.control.should_stop() {
            // A worker whose update panicked skips straight to the barrier so
            // the others can rendezvous with it; the checkpoint then stops the run.
            let due = if healthy {
                let iteration = self.control.iteration();
                if panic::catch_unwind(AssertUnwindSafe(|| worker.update(iteration))).is_ok() {
                    let completed = self.control.complete_iteration();
                    self.control.checkpoint_due(completed)
                } else {
                    healthy = false;
                    self.record_panic(worker_id);
                    true
                }
            } else {
                true
            };

            if due {
                barrier.wait();
                if worker_id == 0 {
                    self.checkpoint(&mut worker, healthy);
                }
                barrier.wait();
            }
        }

        tracing::debug!("Worker stopped");
    }

    /// Runs on worker 0 while every other worker is parked at the barrier
    fn checkpoint<R: WorkerRule>(&self, worker: &mut R, healthy: bool) {
        let iteration = self.control.iteration();
        if healthy {
            let policy = self.store.policy_snapshot();
            match panic::catch_unwind(AssertUnwindSafe(|| worker.evaluate(&policy))) {
                Ok(evaluation) => {
                    if let Err(err) = self.log.record(iteration, &evaluation) {
                        tracing::error!(iteration, error = %err, "Failed to write checkpoint");
                        self.failure.lock().get_or_insert(err);
                    }
                }
                Err(_) => self.record_panic(0),
            }
        }

        self.control.advance_threshold(self.config.check_step);
        if self.failure.lock().is_some() {
            self.control.request_stop();
        }
        if iteration > self.config.max_outer_iter {
            tracing::debug!(iteration, "Iteration budget spent");
            self.control.request_stop();
        }
    }

    fn record_panic(&self, worker_id: usize) {
        tracing::error!(worker_id, "Worker panicked, stopping at the next checkpoint");
        self.failure
            .lock()
            .get_or_insert(DpError::WorkerPanicked(worker_id));
    }
}
