//! `CheckpointManager` — serialize orchestrator state into a
//! [`CheckpointBlob`], persist it via [`CheckpointStore`], and reconcile a
//! loaded blob back into a freshly built orchestrator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, ConceptStatus, ItemStatus};
use crate::concept::ConceptRepo;
use crate::error::OrchestratorResult;
use crate::inference::InferenceRepo;
use crate::tracker::ProcessTracker;

use super::blob::{BlackboardBlob, CheckpointBlob, SignatureBlob, TrackerBlob, SCHEMA_VERSION};
use super::store::CheckpointStore;

/// How a loaded checkpoint's saved state is installed into a freshly
/// built orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationMode {
    /// Trust the checkpoint blindly: write every key in the blob.
    /// Concepts absent from the blob keep their ground/empty defaults.
    Overwrite,
    /// For each concept/item present in the blob, compare its saved
    /// signature against the current repo's. Install only on a match;
    /// a mismatch means the definition changed, so the saved state is
    /// discarded and the concept/item is left to be recomputed.
    Patch,
    /// Only install saved state for concepts/items still at their
    /// default empty/pending state; anything the fresh repo already
    /// provides (e.g. new ground data) takes precedence.
    FillGaps,
}

impl Default for ReconciliationMode {
    fn default() -> Self {
        Self::Patch
    }
}

pub struct CheckpointManager {
    store: Arc<CheckpointStore>,
}

impl CheckpointManager {
    pub fn new(store: Arc<CheckpointStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Build a `CheckpointBlob` from the live components of a run.
    pub fn serialize(
        run_id: &str,
        concepts: &ConceptRepo,
        inferences: &InferenceRepo,
        blackboard: &Blackboard,
        tracker: &ProcessTracker,
        workspace: &serde_json::Value,
    ) -> CheckpointBlob {
        let concept_references = concepts
            .all()
            .iter()
            .filter_map(|c| c.reference.as_ref().map(|r| (c.concept_name.clone(), r.clone())))
            .collect();

        let blackboard_blob = BlackboardBlob {
            concept_status: blackboard.concept_statuses().clone(),
            item_status: blackboard.item_statuses().clone(),
            item_result: blackboard.item_results().clone(),
            execution_count: blackboard.item_execution_counts().clone(),
            completion_timestamp: blackboard.completed_concept_timestamps().clone(),
            truth_masks: blackboard.truth_masks().clone(),
            concept_references,
        };

        let tracker_blob = TrackerBlob {
            cycle_count: tracker.cycle_count,
            total_executions: tracker.total_executions,
            successful_executions: tracker.successful_executions,
            skipped_count: tracker.skipped_count,
            failed_count: tracker.failed_count,
            retry_count: tracker.retry_count,
            completion_order: tracker.completion_order.clone(),
        };

        let concept_signatures = concepts.all().iter().map(|c| (c.concept_name.clone(), c.signature())).collect();
        // Keyed by flow index, per the checkpoint file format.
        let inference_signatures = inferences.all().iter().map(|i| (i.flow_index.clone(), i.signature())).collect();

        CheckpointBlob {
            blackboard: blackboard_blob,
            tracker: tracker_blob,
            workspace: workspace.clone(),
            signatures: SignatureBlob {
                concept_signatures,
                inference_signatures,
            },
            run_id: run_id.to_string(),
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn save(
        &self,
        run_id: &str,
        cycle: u64,
        inference_count: u64,
        concepts: &ConceptRepo,
        inferences: &InferenceRepo,
        blackboard: &Blackboard,
        tracker: &ProcessTracker,
        workspace: &serde_json::Value,
    ) -> OrchestratorResult<()> {
        let blob = Self::serialize(run_id, concepts, inferences, blackboard, tracker, workspace);
        let json = serde_json::to_string(&blob)?;
        self.store.save_checkpoint(run_id, cycle, inference_count, &json)?;
        debug!(run_id, cycle, inference_count, "CheckpointManager::save");
        Ok(())
    }

    /// Load the latest checkpoint for `run_id`, or a specific one if
    /// `cycle`/`inference_count` are given.
    pub fn load(&self, run_id: &str, cycle: Option<u64>, inference_count: Option<u64>) -> OrchestratorResult<Option<CheckpointBlob>> {
        let Some(row) = self.store.load_checkpoint(run_id, cycle, inference_count)? else {
            return Ok(None);
        };
        let blob: CheckpointBlob = serde_json::from_str(&row.json_blob)?;
        Ok(Some(blob))
    }

    /// Install a loaded blob's saved state into a freshly built
    /// orchestrator's components. `is_forking` preserves the old run's
    /// history untouched and resets the tracker rather than installing
    /// the blob's counters, so the forked run starts its own history.
    pub fn reconcile(
        blob: &CheckpointBlob,
        concepts: &mut ConceptRepo,
        inferences: &InferenceRepo,
        blackboard: &mut Blackboard,
        tracker: &mut ProcessTracker,
        workspace: &mut serde_json::Value,
        mode: ReconciliationMode,
        is_forking: bool,
    ) {
        info!(run_id = blob.run_id, ?mode, is_forking, "CheckpointManager::reconcile");

        for (concept_name, &saved_status) in &blob.blackboard.concept_status {
            let install = match mode {
                ReconciliationMode::Overwrite => true,
                ReconciliationMode::Patch => {
                    let saved_sig = blob.signatures.concept_signatures.get(concept_name);
                    let live_sig = concepts.get(concept_name).map(|c| c.signature());
                    saved_status == ConceptStatus::Complete && saved_sig.is_some() && saved_sig == live_sig.as_ref()
                }
                ReconciliationMode::FillGaps => {
                    concepts.get(concept_name).is_some() && blackboard.concept_status(concept_name) == ConceptStatus::Empty
                }
            };
            if !install {
                if mode == ReconciliationMode::Patch && saved_status == ConceptStatus::Complete {
                    warn!(concept_name, "stale checkpoint concept signature, will be recomputed");
                }
                continue;
            }
            blackboard.set_concept_status(concept_name, saved_status);
            if let Some(&timestamp) = blob.blackboard.completion_timestamp.get(concept_name) {
                blackboard.set_completed_concept_timestamp(concept_name, timestamp);
            }
            if let Some(reference) = blob.blackboard.concept_references.get(concept_name) {
                let _ = concepts.set_reference(concept_name, reference.clone());
            }
        }

        for (flow_index, &saved_status) in &blob.blackboard.item_status {
            let Some(entry) = inferences.get_by_flow_index(flow_index) else {
                continue;
            };
            let item_id = entry.id.clone();

            let install = match mode {
                ReconciliationMode::Overwrite => true,
                ReconciliationMode::Patch => {
                    let saved_sig = blob.signatures.inference_signatures.get(flow_index);
                    let live_sig = entry.signature();
                    saved_status == ItemStatus::Completed && saved_sig == Some(&live_sig)
                }
                ReconciliationMode::FillGaps => blackboard.item_status(&item_id) == ItemStatus::Pending,
            };
            if !install {
                if mode == ReconciliationMode::Patch && saved_status == ItemStatus::Completed {
                    warn!(flow_index, "stale checkpoint inference signature, will be re-run");
                }
                continue;
            }

            blackboard.set_item_status(&item_id, saved_status);
            if let Some(detail) = blob.blackboard.item_result.get(flow_index) {
                blackboard.set_item_result(&item_id, detail.clone());
            }
            if let Some(mask) = blob.blackboard.truth_masks.get(flow_index) {
                blackboard.set_truth_mask(&item_id, mask.clone());
            }
            if let Some(&count) = blob.blackboard.execution_count.get(flow_index) {
                blackboard.set_execution_count(&item_id, count);
            }
        }

        *workspace = blob.workspace.clone();

        if !is_forking {
            tracker.cycle_count = blob.tracker.cycle_count;
            tracker.total_executions = blob.tracker.total_executions;
            tracker.successful_executions = blob.tracker.successful_executions;
            tracker.skipped_count = blob.tracker.skipped_count;
            tracker.failed_count = blob.tracker.failed_count;
            tracker.retry_count = blob.tracker.retry_count;
            tracker.completion_order = blob.tracker.completion_order.clone();
        }
    }
}
