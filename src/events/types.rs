//! Event vocabulary for orchestrator activity streaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable activity emitted by the orchestrator: run lifecycle, cycle
/// boundaries, item transitions, and checkpoint saves.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrchestratorEvent {
    /// A run has started.
    RunStarted { run_id: String, root_concept: String },
    /// A cycle of the orchestration loop has completed.
    CycleCompleted {
        run_id: String,
        cycle: u64,
        ready_count: usize,
        waiting_count: usize,
    },
    /// An item (concept or inference) transitioned status.
    ItemTransitioned {
        run_id: String,
        item_id: String,
        from: String,
        to: String,
    },
    /// An item was skipped via timing-gate propagation.
    ItemSkipped { run_id: String, item_id: String, reason: String },
    /// A checkpoint was written.
    CheckpointSaved { run_id: String, cycle: u64, signature: String },
    /// The run completed (success or deadlock/budget exceeded).
    RunCompleted { run_id: String, success: bool, cycles: u64 },
    /// A sequence invocation failed.
    SequenceError { run_id: String, item_id: String, message: String },
}

impl OrchestratorEvent {
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::CycleCompleted { run_id, .. }
            | Self::ItemTransitioned { run_id, .. }
            | Self::ItemSkipped { run_id, .. }
            | Self::CheckpointSaved { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::SequenceError { run_id, .. } => run_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "RunStarted",
            Self::CycleCompleted { .. } => "CycleCompleted",
            Self::ItemTransitioned { .. } => "ItemTransitioned",
            Self::ItemSkipped { .. } => "ItemSkipped",
            Self::CheckpointSaved { .. } => "CheckpointSaved",
            Self::RunCompleted { .. } => "RunCompleted",
            Self::SequenceError { .. } => "SequenceError",
        }
    }
}

/// A timestamped event, as written to an event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: OrchestratorEvent,
}

impl EventLogEntry {
    pub fn new(event: OrchestratorEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
