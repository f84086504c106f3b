//! `Blackboard` — per-run status and result tracking for concepts and items.
//!
//! Owned directly by the orchestrator's cycle loop; nothing outside that
//! loop touches it, so it's a plain struct rather than an actor — there is
//! no intra-cycle parallelism for it to arbitrate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::concept::ConceptRepo;
use crate::inference::InferenceRepo;
use crate::reference::Reference;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConceptStatus {
    Empty,
    Pending,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ItemStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Outcome detail recorded alongside a completed item's status. Judgement
/// sequences complete with `Success` (condition met) or `ConditionNotMet`;
/// a timing node's dependents completed via skip propagation carry
/// `Skipped`; every other sequence kind completes with `Success` or fails
/// outright.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CompletionDetail {
    Success,
    ConditionNotMet,
    Skipped,
}

#[derive(Debug, Default)]
pub struct Blackboard {
    concept_statuses: HashMap<String, ConceptStatus>,
    item_statuses: HashMap<String, ItemStatus>,
    item_results: HashMap<String, CompletionDetail>,
    item_execution_counts: HashMap<String, u32>,
    completed_concept_timestamps: HashMap<String, DateTime<Utc>>,
    truth_masks: HashMap<String, Reference>,
}

impl Blackboard {
    /// Seed all concept and item statuses for a freshly loaded repo pair.
    /// Ground concepts start `Complete`; everything else starts empty or
    /// pending.
    pub fn initialize(concepts: &ConceptRepo, inferences: &InferenceRepo) -> Self {
        let mut board = Self::default();

        for concept in concepts.all() {
            let status = if concept.is_ground_concept {
                ConceptStatus::Complete
            } else {
                ConceptStatus::Empty
            };
            board.concept_statuses.insert(concept.concept_name.clone(), status);
            if status == ConceptStatus::Complete {
                board
                    .completed_concept_timestamps
                    .insert(concept.concept_name.clone(), Utc::now());
            }
        }

        for item in inferences.all() {
            board.item_statuses.insert(item.id.clone(), ItemStatus::Pending);
            board.item_execution_counts.insert(item.id.clone(), 0);
        }

        debug!(
            concepts = board.concept_statuses.len(),
            items = board.item_statuses.len(),
            "Blackboard::initialize"
        );
        board
    }

    pub fn concept_status(&self, concept_name: &str) -> ConceptStatus {
        self.concept_statuses
            .get(concept_name)
            .copied()
            .unwrap_or(ConceptStatus::Empty)
    }

    pub fn set_concept_status(&mut self, concept_name: &str, status: ConceptStatus) {
        debug!(concept_name, ?status, "Blackboard::set_concept_status");
        if status == ConceptStatus::Complete {
            self.completed_concept_timestamps
                .insert(concept_name.to_string(), Utc::now());
        } else {
            self.completed_concept_timestamps.remove(concept_name);
        }
        self.concept_statuses.insert(concept_name.to_string(), status);
    }

    pub fn item_status(&self, item_id: &str) -> ItemStatus {
        self.item_statuses.get(item_id).copied().unwrap_or(ItemStatus::Pending)
    }

    pub fn set_item_status(&mut self, item_id: &str, status: ItemStatus) {
        debug!(item_id, ?status, "Blackboard::set_item_status");
        self.item_statuses.insert(item_id.to_string(), status);
    }

    pub fn item_result(&self, item_id: &str) -> Option<&CompletionDetail> {
        self.item_results.get(item_id)
    }

    pub fn set_item_result(&mut self, item_id: &str, detail: CompletionDetail) {
        self.item_results.insert(item_id.to_string(), detail);
    }

    pub fn execution_count(&self, item_id: &str) -> u32 {
        self.item_execution_counts.get(item_id).copied().unwrap_or(0)
    }

    pub fn increment_execution_count(&mut self, item_id: &str) -> u32 {
        let count = self.item_execution_counts.entry(item_id.to_string()).or_insert(0);
        *count += 1;
        debug!(item_id, count = *count, "Blackboard::increment_execution_count");
        *count
    }

    /// Install a saved execution count verbatim during checkpoint
    /// reconciliation, rather than incrementing.
    pub fn set_execution_count(&mut self, item_id: &str, count: u32) {
        self.item_execution_counts.insert(item_id.to_string(), count);
    }

    /// True on an item's very first execution (count was 0 before the
    /// caller's increment).
    pub fn is_first_execution(&self, item_id: &str) -> bool {
        self.execution_count(item_id) == 0
    }

    pub fn truth_mask(&self, item_id: &str) -> Option<&Reference> {
        self.truth_masks.get(item_id)
    }

    pub fn set_truth_mask(&mut self, item_id: &str, mask: Reference) {
        self.truth_masks.insert(item_id.to_string(), mask);
    }

    /// Snapshot accessors consumed by `checkpoint::manager` when
    /// serializing this blackboard into a `CheckpointBlob`. Read-only —
    /// reconciliation writes back through the per-key setters above.
    pub fn concept_statuses(&self) -> &HashMap<String, ConceptStatus> {
        &self.concept_statuses
    }

    pub fn item_statuses(&self) -> &HashMap<String, ItemStatus> {
        &self.item_statuses
    }

    pub fn item_results(&self) -> &HashMap<String, CompletionDetail> {
        &self.item_results
    }

    pub fn item_execution_counts(&self) -> &HashMap<String, u32> {
        &self.item_execution_counts
    }

    pub fn completed_concept_timestamps(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.completed_concept_timestamps
    }

    pub fn truth_masks(&self) -> &HashMap<String, Reference> {
        &self.truth_masks
    }

    /// Install a saved completion timestamp verbatim during checkpoint
    /// reconciliation, rather than stamping `Utc::now()` as
    /// `set_concept_status` does for live transitions.
    pub fn set_completed_concept_timestamp(&mut self, concept_name: &str, timestamp: DateTime<Utc>) {
        self.completed_concept_timestamps.insert(concept_name.to_string(), timestamp);
    }

    pub fn completed_concepts(&self) -> impl Iterator<Item = &String> {
        self.concept_statuses
            .iter()
            .filter(|(_, status)| **status == ConceptStatus::Complete)
            .map(|(name, _)| name)
    }

    pub fn has_pending_or_in_progress_items(&self) -> bool {
        self.item_statuses
            .values()
            .any(|status| matches!(status, ItemStatus::Pending | ItemStatus::InProgress))
    }

    /// Reset a concept and its item back to pre-execution state, for the
    /// "reset-first" half of a quantifying-loop iteration reset. Callers
    /// must not call this for concepts flagged `is_invariant`.
    pub fn reset_item(&mut self, item_id: &str) {
        debug!(item_id, "Blackboard::reset_item");
        self.item_statuses.insert(item_id.to_string(), ItemStatus::Pending);
        self.item_results.remove(item_id);
        self.truth_masks.remove(item_id);
    }

    pub fn reset_concept(&mut self, concept_name: &str) {
        debug!(concept_name, "Blackboard::reset_concept");
        self.concept_statuses.insert(concept_name.to_string(), ConceptStatus::Pending);
        self.completed_concept_timestamps.remove(concept_name);
    }
}
