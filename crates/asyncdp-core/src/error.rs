//! Error types for the dynamic-programming core

use thiserror::Error;

/// Core error type for solver operations
#[derive(Error, Debug)]
pub enum DpError {
    /// Invalid or inconsistent run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// State index outside the table
    #[error("Invalid state: {state} (state space has {len} states)")]
    InvalidState {
        /// Offending state index
        state: usize,
        /// Number of states in the table
        len: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Size the run configuration asks for
        expected: usize,
        /// Size the component actually has
        actual: usize,
    },

    /// A worker panicked during an update or evaluation
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for solver operations
pub type Result<T> = std::result::Result<T, DpError>;
