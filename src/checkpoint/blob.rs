//! `CheckpointBlob` — the JSON document stored in `checkpoints.json_blob`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blackboard::{CompletionDetail, ConceptStatus, ItemStatus};
use crate::reference::Reference;

/// Schema version of the blob shape below. Bumped whenever a
/// backward-incompatible field is added or removed.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlackboardBlob {
    pub concept_status: HashMap<String, ConceptStatus>,
    pub item_status: HashMap<String, ItemStatus>,
    pub item_result: HashMap<String, CompletionDetail>,
    pub execution_count: HashMap<String, u32>,
    pub completion_timestamp: HashMap<String, DateTime<Utc>>,
    pub truth_masks: HashMap<String, Reference>,
    /// Concept references that currently hold a value, keyed by concept
    /// name. Concepts with no reference (still empty) are simply absent.
    pub concept_references: HashMap<String, Reference>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackerBlob {
    pub cycle_count: u64,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
    pub retry_count: u64,
    pub completion_order: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SignatureBlob {
    pub concept_signatures: HashMap<String, String>,
    /// Keyed by flow index, per the checkpoint file format.
    pub inference_signatures: HashMap<String, String>,
}

/// The full saved state of one orchestration run at a point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointBlob {
    pub blackboard: BlackboardBlob,
    pub tracker: TrackerBlob,
    /// Scratch key-value state threaded through sequence executions.
    /// Opaque to the orchestrator core; preserved verbatim across
    /// checkpoint/reconcile.
    #[serde(default)]
    pub workspace: serde_json::Value,
    pub signatures: SignatureBlob,
    pub run_id: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let blob = CheckpointBlob {
            blackboard: BlackboardBlob::default(),
            tracker: TrackerBlob::default(),
            workspace: serde_json::json!({}),
            signatures: SignatureBlob::default(),
            run_id: "run-1".to_string(),
            schema_version: SCHEMA_VERSION,
        };
        let json = serde_json::to_string(&blob).unwrap();
        let parsed: CheckpointBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn missing_schema_version_defaults() {
        let json = r#"{"blackboard":{"concept_status":{},"item_status":{},"item_result":{},"execution_count":{},"completion_timestamp":{},"truth_masks":{},"concept_references":{}},"tracker":{"cycle_count":0,"total_executions":0,"successful_executions":0,"retry_count":0,"completion_order":[]},"signatures":{"concept_signatures":{},"inference_signatures":{}},"run_id":"run-1"}"#;
        let parsed: CheckpointBlob = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.schema_version, SCHEMA_VERSION);
    }
}
