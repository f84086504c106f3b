//! Crate-wide error types.

use thiserror::Error;

/// Errors raised by the orchestration core.
///
/// Sequence failures and user-interaction requests are deliberately not
/// variants here — they travel as [`crate::sequence::SequenceOutcome`]
/// values returned from a [`crate::sequence::Sequence`], never as
/// exceptions thrown across the readiness/cycle boundary.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("concept not found: {0}")]
    ConceptNotFound(String),

    #[error("inference not found: {0}")]
    InferenceNotFound(String),

    #[error("duplicate axis name in reference: {0}")]
    DuplicateAxis(String),

    #[error("axis length mismatch: axis {axis} expected {expected}, got {actual}")]
    AxisLengthMismatch {
        axis: String,
        expected: usize,
        actual: usize,
    },

    #[error("axis not found in reference: {0}")]
    AxisNotFound(String),

    #[error("cyclic flow index detected at: {0}")]
    CyclicFlowIndex(String),

    #[error("malformed repository file {path}: {reason}")]
    MalformedRepo { path: String, reason: String },

    #[error("no progress possible: {waiting} item(s) still waiting, none ready")]
    Deadlocked { waiting: usize },

    #[error("cycle budget exceeded: {cycles} cycles")]
    CycleBudgetExceeded { cycles: u64 },

    #[error("checkpoint store error: {0}")]
    CheckpointStore(#[from] rusqlite::Error),

    #[error("checkpoint blob deserialization error: {0}")]
    CheckpointBlob(#[from] serde_json::Error),

    #[error("checkpoint signature mismatch for run {run_id}: stored={stored}, live={live}")]
    StaleCheckpoint {
        run_id: String,
        stored: String,
        live: String,
    },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("channel closed while waiting for reply")]
    ChannelClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
