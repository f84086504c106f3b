//! The cycle-based execution engine: readiness, execution, skip
//! propagation, and the top-level run loop.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, CompletionDetail, ConceptStatus, ItemStatus};
use crate::checkpoint::{CheckpointBlob, CheckpointManager, ReconciliationMode};
use crate::concept::ConceptRepo;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::EventEmitter;
use crate::inference::InferenceRepo;
use crate::reference::{Reference, Value};
use crate::sequence::{ConceptWrite, Sequence, SequenceInput, SequenceOutcome};
use crate::tracker::ProcessTracker;
use crate::waitlist::{Waitlist, WaitlistItem};

use super::control::{ControlSignal, RunControlWatcher};

/// What happened to a run after `run` returns control to its caller.
#[derive(Debug)]
pub enum RunOutcome {
    /// All items reached a terminal state.
    Completed { final_concepts: Vec<String> },
    /// A cycle produced no progress; the run is stuck.
    Deadlocked { waiting: usize },
    /// `max_cycles` was reached before completion.
    CycleBudgetExceeded,
    /// The run was cancelled via `RunControl::cancel`.
    Cancelled,
    /// A sequence needs input from outside the orchestrator before item
    /// `item_id` can proceed; the caller must resolve it and resume.
    NeedsUserInteraction { item_id: String, prompt: String },
}

/// What one item's execution accomplished this cycle.
enum ItemOutcome {
    /// `true` if the item reached a terminal status (completed/skipped/
    /// failed); `false` if it should be retried next cycle.
    Progressed(bool),
    NeedsUserInteraction { prompt: String },
}

/// What one cycle accomplished.
enum CycleOutcome {
    Progress { made_progress: bool, retries: Vec<String> },
    NeedsUserInteraction { item_id: String, prompt: String },
}

/// Owns the full mutable state of one orchestration run and drives its
/// cycle loop. Not `Clone` — there is exactly one of these per run, and
/// `RunControl` is the only handle other tasks get to it.
pub struct Orchestrator {
    run_id: String,
    concepts: ConceptRepo,
    inferences: InferenceRepo,
    waitlist: Waitlist,
    blackboard: Blackboard,
    tracker: ProcessTracker,
    sequences: HashMap<String, Arc<dyn Sequence>>,
    events: EventEmitter,
    max_cycles: u64,
    /// Scratch key-value state threaded through sequence executions.
    /// Opaque to the cycle loop; preserved verbatim across checkpoints.
    workspace: serde_json::Value,
    /// Mirrors `RunConfig::dev_mode`; passed to every sequence via
    /// `SequenceInput` so `Reference` operations raise instead of
    /// returning skip markers.
    dev_mode: bool,
}

impl Orchestrator {
    pub fn new(
        run_id: impl Into<String>,
        concepts: ConceptRepo,
        inferences: InferenceRepo,
        sequences: HashMap<String, Arc<dyn Sequence>>,
        events: EventEmitter,
        max_cycles: u64,
    ) -> Self {
        let waitlist = Waitlist::from_inferences(inferences.all().iter().cloned());
        let blackboard = Blackboard::initialize(&concepts, &inferences);
        Self {
            run_id: run_id.into(),
            concepts,
            inferences,
            waitlist,
            blackboard,
            tracker: ProcessTracker::new(),
            sequences,
            events,
            max_cycles,
            workspace: serde_json::json!({}),
            dev_mode: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn concepts(&self) -> &ConceptRepo {
        &self.concepts
    }

    pub fn concepts_mut(&mut self) -> &mut ConceptRepo {
        &mut self.concepts
    }

    pub fn inferences(&self) -> &InferenceRepo {
        &self.inferences
    }

    pub fn inferences_mut(&mut self) -> &mut InferenceRepo {
        &mut self.inferences
    }

    pub fn tracker(&self) -> &ProcessTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ProcessTracker {
        &mut self.tracker
    }

    pub fn workspace(&self) -> &serde_json::Value {
        &self.workspace
    }

    pub fn waitlist(&self) -> &Waitlist {
        &self.waitlist
    }

    /// Raise or lower the cycle budget `run` checks against. Used by the
    /// CLI to drive a resumed run a bounded number of cycles at a time
    /// (`step`, `run-to`) without duplicating `run`'s loop.
    pub fn set_max_cycles(&mut self, max_cycles: u64) {
        self.max_cycles = max_cycles;
    }

    /// Set the dev-mode flag passed to sequences via `SequenceInput`.
    pub fn set_dev_mode(&mut self, dev_mode: bool) {
        self.dev_mode = dev_mode;
    }

    /// Whether `item_id` would be picked up and executed by the next
    /// cycle. Exposed so a caller can check a breakpoint set against the
    /// items actually about to run, rather than every still-pending one.
    pub fn is_item_ready(&self, item_id: &str) -> bool {
        match self.waitlist.get(item_id) {
            Some(item) => self.blackboard.item_status(item_id) == ItemStatus::Pending && self.is_ready(item),
            None => false,
        }
    }

    /// Snapshot this run's full state into a `CheckpointBlob`, ready for
    /// `CheckpointManager::save`.
    pub fn checkpoint_blob(&self) -> CheckpointBlob {
        CheckpointManager::serialize(&self.run_id, &self.concepts, &self.inferences, &self.blackboard, &self.tracker, &self.workspace)
    }

    /// Install a loaded checkpoint's saved state into this (freshly built)
    /// orchestrator. `new_run_id`, if given and different from the blob's
    /// own run id, forks the run: subsequent executions are recorded under
    /// it and the tracker starts its own history rather than inheriting
    /// the checkpoint's counters.
    pub fn reconcile_checkpoint(&mut self, blob: &CheckpointBlob, mode: ReconciliationMode, new_run_id: Option<String>) {
        let is_forking = new_run_id.as_deref().is_some_and(|id| id != blob.run_id);
        CheckpointManager::reconcile(
            blob,
            &mut self.concepts,
            &self.inferences,
            &mut self.blackboard,
            &mut self.tracker,
            &mut self.workspace,
            mode,
            is_forking,
        );
        if is_forking {
            self.run_id = new_run_id.expect("checked above");
        }
    }

    /// Readiness predicate. `start_with_support_reference_only` and
    /// `start_without_function`/`start_without_value` always bypass their
    /// respective check; the matching `*_only_once` flags bypass only on
    /// the item's first execution. These are independent OR'd bypass
    /// conditions, not a priority chain — the value-concept flags
    /// short-circuit the whole predicate rather than just their own check.
    fn is_ready(&self, item: &WaitlistItem) -> bool {
        let entry = &item.inference;
        let is_first_execution = self.blackboard.is_first_execution(item.id());

        if !entry.start_with_support_reference_only
            && !(entry.start_without_support_reference_only_once && is_first_execution)
            && !self.are_supporting_items_complete(item)
        {
            debug!(item = item.id(), "is_ready: supporting items incomplete");
            return false;
        }

        if !entry.start_without_function
            && !(entry.start_without_function_only_once && is_first_execution)
            && !self.is_function_concept_ready(item)
        {
            debug!(item = item.id(), "is_ready: function concept not ready");
            return false;
        }

        if entry.start_without_value || (entry.start_without_value_only_once && is_first_execution) {
            return true;
        }

        if !self.are_value_concepts_ready(item) {
            debug!(item = item.id(), "is_ready: value concepts not ready");
            return false;
        }

        true
    }

    fn are_supporting_items_complete(&self, item: &WaitlistItem) -> bool {
        self.waitlist
            .get_supporting_items(item)
            .iter()
            .all(|support| self.blackboard.item_status(support.id()) == ItemStatus::Completed)
    }

    fn is_function_concept_ready(&self, item: &WaitlistItem) -> bool {
        match &item.inference.function_concept {
            None => true,
            Some(name) => self.blackboard.concept_status(name) == ConceptStatus::Complete,
        }
    }

    /// For `"assigning"` inferences with more than one candidate source
    /// concept (`syntax.assign_source`), readiness needs only one source
    /// complete plus every non-source value concept complete. Every other
    /// inference requires all of its value concepts complete.
    fn are_value_concepts_ready(&self, item: &WaitlistItem) -> bool {
        if let Some(sources) = item.inference.assign_source_names() {
            let (source_concepts, other_concepts): (Vec<_>, Vec<_>) = item
                .inference
                .value_concepts
                .iter()
                .partition(|name| sources.contains(name));

            let one_source_ready = source_concepts
                .iter()
                .any(|name| self.blackboard.concept_status(name) == ConceptStatus::Complete);
            let all_others_ready = other_concepts
                .iter()
                .all(|name| self.blackboard.concept_status(name) == ConceptStatus::Complete);
            return one_source_ready && all_others_ready;
        }

        item.inference
            .value_concepts
            .iter()
            .all(|name| self.blackboard.concept_status(name) == ConceptStatus::Complete)
    }

    /// Mark a dependent item (a flow-index ancestor) completed-by-skip
    /// because a timing gate underneath it decided it should not run.
    fn propagate_skip(&mut self, item_id: &str, timing_flow_index: &str) {
        info!(item_id, timing_flow_index, "item skipped due to dependent timing gate");
        self.blackboard.set_item_status(item_id, ItemStatus::Completed);
        self.blackboard.set_item_result(item_id, CompletionDetail::Skipped);

        let concept_name = self
            .waitlist
            .get(item_id)
            .map(|item| item.inference.concept_to_infer.clone());
        if let Some(concept_name) = concept_name {
            self.blackboard
                .set_concept_status(&concept_name, ConceptStatus::Complete);
            let _ = self.concepts.set_reference(&concept_name, Reference::skipped());
            self.tracker
                .add_execution_record(self.tracker.cycle_count, item_id, "skip-propagation", "skipped", &concept_name);
        }
        self.tracker.record_completion(item_id);
        self.events.item_transitioned(item_id, "Pending", "Completed");
        self.events
            .item_skipped(item_id, &format!("timing node {timing_flow_index} skipped"));
    }

    fn build_sequence_input(&self, item: &WaitlistItem) -> SequenceInput {
        let entry = &item.inference;
        let resolve = |name: &String| -> Option<(String, Reference)> {
            self.concepts
                .get(name)
                .and_then(|c| c.reference.clone())
                .map(|r| (name.clone(), r))
        };
        SequenceInput {
            concept_to_infer: entry.concept_to_infer.clone(),
            function: entry.function_concept.as_ref().and_then(resolve).map(|(_, r)| r),
            values: entry.value_concepts.iter().filter_map(resolve).collect(),
            contexts: entry.context_concepts.iter().filter_map(resolve).collect(),
            execution_count: self.blackboard.execution_count(item.id()),
            dev_mode: self.dev_mode,
        }
    }

    /// Execute one ready item, returning whether it made terminal progress
    /// or needs to be retried, or a needs-user-interaction signal.
    async fn execute_item(&mut self, item_id: &str) -> OrchestratorResult<ItemOutcome> {
        let item = self
            .waitlist
            .get(item_id)
            .ok_or_else(|| OrchestratorError::InferenceNotFound(item_id.to_string()))?
            .clone();

        self.blackboard.set_item_status(item_id, ItemStatus::InProgress);
        self.blackboard.increment_execution_count(item_id);
        self.events.item_transitioned(item_id, "Pending", "InProgress");

        let input = self.build_sequence_input(&item);
        let sequence = self.sequences.get(&item.inference.inference_sequence).cloned();
        let outcome = match sequence {
            Some(sequence) => sequence.execute(input).await,
            None => SequenceOutcome::Failed {
                message: format!("no sequence registered for '{}'", item.inference.inference_sequence),
            },
        };

        match outcome {
            SequenceOutcome::Completed {
                writes,
                condition_met,
                truth_mask,
            } => {
                self.complete_item(&item, writes, condition_met, truth_mask);
                Ok(ItemOutcome::Progressed(true))
            }
            SequenceOutcome::TimingGate { ready, skip_children } => {
                if !ready {
                    self.blackboard.set_item_status(item_id, ItemStatus::Pending);
                    return Ok(ItemOutcome::Progressed(false));
                }
                self.complete_item(
                    &item,
                    vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Bool(true)))],
                    None,
                    None,
                );
                if skip_children {
                    let dependents: Vec<String> = self
                        .waitlist
                        .get_dependent_items(&item)
                        .into_iter()
                        .map(|dependent| dependent.id().to_string())
                        .collect();
                    for dependent_id in dependents {
                        self.propagate_skip(&dependent_id, item_id);
                    }
                }
                Ok(ItemOutcome::Progressed(true))
            }
            SequenceOutcome::Retry { reason } => {
                debug!(item_id, reason, "item needs retry");
                self.blackboard.set_item_status(item_id, ItemStatus::Pending);
                self.tracker.record_retry();
                Ok(ItemOutcome::Progressed(false))
            }
            SequenceOutcome::IterationReset { reference, workspace_key } => {
                debug!(item_id, "quantifying loop not yet complete, resetting supporters");
                self.blackboard.set_item_status(item_id, ItemStatus::Pending);
                if let Some(reference) = reference {
                    let _ = self.concepts.set_reference(&item.inference.concept_to_infer, reference);
                }

                let supporting: Vec<(String, String)> = self
                    .waitlist
                    .get_supporting_items(&item)
                    .into_iter()
                    .map(|child| (child.id().to_string(), child.inference.concept_to_infer.clone()))
                    .collect();
                for (child_id, concept_name) in supporting {
                    self.blackboard.reset_item(&child_id);
                    self.blackboard.set_execution_count(&child_id, 0);
                    let is_invariant = self.concepts.get(&concept_name).map(|c| c.is_invariant).unwrap_or(false);
                    if !is_invariant {
                        self.blackboard.reset_concept(&concept_name);
                        let _ = self.concepts.clear_reference(&concept_name);
                    }
                }

                if let Some(key) = workspace_key {
                    if let Some(obj) = self.workspace.as_object_mut() {
                        obj.remove(&key);
                    }
                }

                self.tracker.record_retry();
                Ok(ItemOutcome::Progressed(false))
            }
            SequenceOutcome::Failed { message } => {
                warn!(item_id, message, "item execution failed");
                self.blackboard.set_item_status(item_id, ItemStatus::Failed);
                self.tracker.add_execution_record(
                    self.tracker.cycle_count,
                    item_id,
                    &item.inference.inference_sequence,
                    "failed",
                    &item.inference.concept_to_infer,
                );
                self.events.sequence_error(item_id, &message);
                Ok(ItemOutcome::Progressed(true))
            }
            SequenceOutcome::NeedsUserInteraction { prompt } => {
                self.blackboard.set_item_status(item_id, ItemStatus::Pending);
                Ok(ItemOutcome::NeedsUserInteraction { prompt })
            }
        }
    }

    /// Merge a sequence's writes back into ConceptRepo (spec's `execute_item`
    /// step 3): each write lands on its named concept, defaulting to the
    /// item's own `concept_to_infer`, and that concept's status becomes
    /// `complete`.
    fn complete_item(&mut self, item: &WaitlistItem, writes: Vec<ConceptWrite>, condition_met: Option<bool>, truth_mask: Option<Reference>) {
        let item_id = item.id();
        let concept_name = item.inference.concept_to_infer.clone();

        let detail = if item.inference.is_judgement() {
            match condition_met {
                Some(true) => CompletionDetail::Success,
                _ => CompletionDetail::ConditionNotMet,
            }
        } else {
            CompletionDetail::Success
        };

        self.blackboard.set_item_status(item_id, ItemStatus::Completed);
        self.blackboard.set_item_result(item_id, detail);
        if let Some(mask) = truth_mask {
            self.blackboard.set_truth_mask(item_id, mask);
        }

        for write in writes {
            let target = write.concept.unwrap_or_else(|| concept_name.clone());
            let _ = self.concepts.set_reference(&target, write.reference);
            self.blackboard.set_concept_status(&target, ConceptStatus::Complete);
        }

        self.tracker.add_execution_record(
            self.tracker.cycle_count,
            item_id,
            &item.inference.inference_sequence,
            "completed",
            &concept_name,
        );
        self.tracker.record_completion(item_id);
        self.events.item_transitioned(item_id, "InProgress", "Completed");
    }

    /// Run one cycle: retries from the previous cycle first, then every
    /// other pending item in flow-index order.
    async fn run_cycle(&mut self, retries: Vec<String>) -> OrchestratorResult<CycleOutcome> {
        let mut made_progress = false;
        let mut next_retries = Vec::new();

        let mut ordered_ids: Vec<String> = retries;
        let rest: Vec<String> = self
            .waitlist
            .items()
            .iter()
            .map(|item| item.id().to_string())
            .filter(|id| !ordered_ids.contains(id))
            .collect();
        ordered_ids.extend(rest);

        for item_id in ordered_ids {
            if self.blackboard.item_status(&item_id) != ItemStatus::Pending {
                continue;
            }
            let item = match self.waitlist.get(&item_id) {
                Some(item) => item.clone(),
                None => continue,
            };
            if !self.is_ready(&item) {
                continue;
            }

            match self.execute_item(&item_id).await? {
                ItemOutcome::Progressed(true) => {
                    made_progress = true;
                    self.events
                        .cycle_completed(self.tracker.cycle_count, self.count_ready(), self.count_waiting());
                }
                ItemOutcome::Progressed(false) => {
                    next_retries.push(item_id);
                }
                ItemOutcome::NeedsUserInteraction { prompt } => {
                    return Ok(CycleOutcome::NeedsUserInteraction { item_id, prompt });
                }
            }
        }

        Ok(CycleOutcome::Progress {
            made_progress,
            retries: next_retries,
        })
    }

    fn count_ready(&self) -> usize {
        self.waitlist
            .items()
            .iter()
            .filter(|item| self.blackboard.item_status(item.id()) == ItemStatus::Pending && self.is_ready(item))
            .count()
    }

    fn count_waiting(&self) -> usize {
        self.waitlist
            .items()
            .iter()
            .filter(|item| self.blackboard.item_status(item.id()) == ItemStatus::Pending)
            .count()
    }

    /// Drive cycles until completion, deadlock, the cycle budget, a
    /// cancel signal, or a needs-user-interaction outcome.
    pub async fn run(&mut self, mut control: RunControlWatcher) -> OrchestratorResult<RunOutcome> {
        self.events.run_started("root");
        let mut retries: Vec<String> = Vec::new();

        while self.blackboard.has_pending_or_in_progress_items() && self.tracker.cycle_count < self.max_cycles {
            if control.wait_while_paused().await == ControlSignal::Cancelled {
                self.events.run_completed(false, self.tracker.cycle_count);
                return Ok(RunOutcome::Cancelled);
            }

            self.tracker.advance_cycle();
            info!(cycle = self.tracker.cycle_count, "cycle start");

            match self.run_cycle(retries).await? {
                CycleOutcome::Progress { made_progress, retries: next_retries } => {
                    retries = next_retries;
                    if !made_progress {
                        warn!(waiting = self.count_waiting(), "no progress made this cycle, deadlock");
                        self.events.run_completed(false, self.tracker.cycle_count);
                        return Ok(RunOutcome::Deadlocked {
                            waiting: self.count_waiting(),
                        });
                    }
                }
                CycleOutcome::NeedsUserInteraction { item_id, prompt } => {
                    return Ok(RunOutcome::NeedsUserInteraction { item_id, prompt });
                }
            }
        }

        if self.tracker.cycle_count >= self.max_cycles && self.blackboard.has_pending_or_in_progress_items() {
            warn!(max_cycles = self.max_cycles, "cycle budget exceeded");
            self.events.run_completed(false, self.tracker.cycle_count);
            return Ok(RunOutcome::CycleBudgetExceeded);
        }

        self.tracker.log_summary(&self.waitlist, &self.blackboard, &self.concepts);
        self.events.run_completed(true, self.tracker.cycle_count);

        let final_concepts = self
            .concepts
            .all()
            .iter()
            .filter(|c| c.is_final_concept)
            .map(|c| c.concept_name.clone())
            .collect();
        Ok(RunOutcome::Completed { final_concepts })
    }
}
