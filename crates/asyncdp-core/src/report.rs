//! Checkpoint log and run report

use std::io::Write;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Algorithm, Evaluation, Result, RunConfig};

/// Header line of the plain-text checkpoint log
pub const LOG_HEADER: &str = "iter time reward flag";

/// One evaluation safepoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Iteration counter when the checkpoint fired
    pub iteration: u64,
    /// Seconds since the run started, excluding time spent evaluating
    pub wall_seconds: f64,
    /// Average discounted return of the evaluated policy
    pub average_return: f64,
    /// Rollouts that reached the goal
    pub goal_reached: usize,
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.iteration, self.wall_seconds, self.average_return, self.goal_reached
        )
    }
}

struct LogState {
    sink: Box<dyn Write + Send>,
    started: Instant,
    evaluation_time: Duration,
    checkpoints: Vec<Checkpoint>,
}

/// Checkpoint log written by the elected worker.
///
/// Writes the `iter time reward flag` table to its sink and keeps every
/// record for the run report. Wall-clock time excludes the accumulated
/// evaluation time so the column measures solving only.
pub struct CheckpointLog {
    state: Mutex<LogState>,
}

impl CheckpointLog {
    /// Log into an arbitrary writer
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(LogState {
                sink: Box::new(sink),
                started: Instant::now(),
                evaluation_time: Duration::ZERO,
                checkpoints: Vec::new(),
            }),
        }
    }

    /// Log to standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Keep records without printing them
    #[must_use]
    pub fn silent() -> Self {
        Self::new(std::io::sink())
    }

    /// Reset the clock and write the header line
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.started = Instant::now();
        state.evaluation_time = Duration::ZERO;
        writeln!(state.sink, "{LOG_HEADER}")?;
        state.sink.flush()?;
        Ok(())
    }

    /// Record an evaluation taken at `iteration`
    pub fn record(&self, iteration: u64, evaluation: &Evaluation) -> Result<Checkpoint> {
        let mut state = self.state.lock();
        state.evaluation_time += evaluation.elapsed;
        let solving = state.started.elapsed().saturating_sub(state.evaluation_time);

        let checkpoint = Checkpoint {
            iteration,
            wall_seconds: solving.as_secs_f64(),
            average_return: evaluation.average_return,
            goal_reached: evaluation.goal_reached,
        };
        if !checkpoint.average_return.is_finite() {
            tracing::warn!(
                iteration,
                average_return = checkpoint.average_return,
                "Policy evaluation returned a non-finite reward"
            );
        }
        tracing::debug!(
            iteration,
            eval_ms = evaluation.elapsed.as_millis(),
            average_return = checkpoint.average_return,
            goal_reached = checkpoint.goal_reached,
            "Checkpoint"
        );

        writeln!(state.sink, "{checkpoint}")?;
        state.sink.flush()?;
        state.checkpoints.push(checkpoint.clone());
        Ok(checkpoint)
    }

    /// Records so far
    #[must_use]
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.state.lock().checkpoints.clone()
    }

    /// Total time spent in policy evaluation
    #[must_use]
    pub fn evaluation_time(&self) -> Duration {
        self.state.lock().evaluation_time
    }
}

impl std::fmt::Debug for CheckpointLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CheckpointLog")
            .field("checkpoints", &state.checkpoints.len())
            .field("evaluation_time", &state.evaluation_time)
            .finish_non_exhaustive()
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run ID
    pub id: String,
    /// Solver that ran
    pub algorithm: Algorithm,
    /// Configuration the run used
    pub config: RunConfig,
    /// Final value of the iteration counter (outer iterations for VRVI)
    pub iterations: u64,
    /// Every checkpoint in order
    pub checkpoints: Vec<Checkpoint>,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: Option<DateTime<Utc>>,
}

impl RunReport {
    /// Open a report for a run starting now
    #[must_use]
    pub fn begin(config: &RunConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            algorithm: config.algorithm,
            config: config.clone(),
            iterations: 0,
            checkpoints: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Close the report with the final counter and the logged checkpoints
    #[must_use]
    pub fn finish(mut self, iterations: u64, log: &CheckpointLog) -> Self {
        self.iterations = iterations;
        self.checkpoints = log.checkpoints();
        self.end_time = Some(Utc::now());
        self
    }

    /// Last checkpoint, if any
    #[must_use]
    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Writer whose contents stay readable after the log takes ownership
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_format() {
        let buffer = SharedBuffer::default();
        let log = CheckpointLog::new(buffer.clone());
        log.start().unwrap();
        let evaluation = Evaluation {
            elapsed: Duration::from_millis(3),
            average_return: 1.5,
            goal_reached: 7,
        };
        let checkpoint = log.record(42, &evaluation).unwrap();
        assert_eq!(checkpoint.iteration, 42);
        assert!(checkpoint.wall_seconds >= 0.0);

        let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(LOG_HEADER));
        let fields: Vec<&str> = lines.next().unwrap().split(' ').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], "42");
        assert_eq!(fields[2], "1.5");
        assert_eq!(fields[3], "7");
        assert_eq!(log.evaluation_time(), Duration::from_millis(3));
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let config = RunConfig {
            len_state: 8,
            len_action: 8,
            seed: Some(7),
            ..RunConfig::default()
        };
        let log = CheckpointLog::silent();
        log.record(
            5,
            &Evaluation {
                elapsed: Duration::ZERO,
                average_return: 0.5,
                goal_reached: 1,
            },
        )
        .unwrap();

        let report = RunReport::begin(&config).finish(5, &log);
        let parsed: RunReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.config, config);
        assert_eq!(parsed.iterations, 5);
        assert_eq!(parsed.last_checkpoint().unwrap().goal_reached, 1);
        assert!(parsed.end_time.is_some());
    }
}
