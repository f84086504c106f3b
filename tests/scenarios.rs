//! Cross-module integration scenarios (S1-S6) exercising the orchestrator
//! through its public API end to end, the way a real caller would: build
//! repos, supply sequences, drive `run`, inspect the result.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use norm_orchestrator::blackboard::{CompletionDetail, ConceptStatus, ItemStatus};
use norm_orchestrator::checkpoint::{CheckpointManager, CheckpointStore, ReconciliationMode};
use norm_orchestrator::concept::{ConceptEntry, ConceptRepo};
use norm_orchestrator::events::create_event_bus;
use norm_orchestrator::inference::{InferenceEntry, InferenceRepo};
use norm_orchestrator::orchestrator::{Orchestrator, RunControl, RunOutcome};
use norm_orchestrator::reference::{Reference, Value};
use norm_orchestrator::sequence::{ConceptWrite, Sequence, SequenceInput, SequenceOutcome};

/// Replays a fixed queue of outcomes, one per call. Integration tests
/// can't reach `sequence::mock::MockSequence` (it's `#[cfg(test)]`-gated
/// inside the library crate), so this is its own copy at the same spirit.
struct ScriptedSequence {
    outcomes: Mutex<VecDeque<SequenceOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedSequence {
    fn new(outcomes: Vec<SequenceOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sequence for ScriptedSequence {
    async fn execute(&self, _input: SequenceInput) -> SequenceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SequenceOutcome::Failed {
                message: "scripted sequence exhausted".to_string(),
            })
    }
}

/// Copies its first value input's reference straight through — the
/// `assigning.copy` sequence shape used by S1.
struct CopySequence;

#[async_trait]
impl Sequence for CopySequence {
    async fn execute(&self, input: SequenceInput) -> SequenceOutcome {
        let reference = input.values.first().map(|(_, r)| r.clone()).unwrap_or_else(|| Reference::scalar(Value::Null));
        SequenceOutcome::Completed {
            writes: vec![ConceptWrite::to_inferred_concept(reference)],
            condition_met: None,
            truth_mask: None,
        }
    }
}

fn orchestrator(run_id: &str, concepts: ConceptRepo, inferences: InferenceRepo, sequences: HashMap<String, Arc<dyn Sequence>>, max_cycles: u64) -> Orchestrator {
    let bus = create_event_bus();
    Orchestrator::new(run_id.to_string(), concepts, inferences, sequences, bus.emitter_for(run_id.to_string()), max_cycles)
}

/// S1: one assigning inference copying a ground concept through.
#[tokio::test]
async fn s1_single_assigning() {
    let concepts_json = r#"[
        {"id":"1","concept_name":"A","type":"list","is_ground_concept":true,"reference_data":[1,2,3],"reference_axis_names":["x"]},
        {"id":"2","concept_name":"B","type":"list","is_final_concept":true}
    ]"#;
    let concepts = ConceptRepo::from_json_str(concepts_json).unwrap();
    let inferences_json = r#"[{"id":"1","inference_sequence":"assigning.copy","concept_to_infer":"B","flow_index":"1","value_concepts":["A"]}]"#;
    let inferences = InferenceRepo::from_json_str(inferences_json, &concepts).unwrap();

    let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
    sequences.insert("assigning.copy".to_string(), Arc::new(CopySequence));

    let mut orch = orchestrator("s1", concepts, inferences, sequences, 10);
    let (_control, watcher) = RunControl::new();
    let outcome = orch.run(watcher).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(orch.tracker().cycle_count, 1);
    assert_eq!(orch.tracker().total_executions, 1);
    assert_eq!(orch.blackboard().item_status("1"), ItemStatus::Completed);
    let b = orch.concepts().get("B").unwrap().reference.clone().unwrap();
    assert_eq!(b, Reference::from_nested(Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]), Some(vec!["x".to_string()])).unwrap());
}

/// S3: a timing gate completing with `skip_children=true` marks every
/// flow-index ancestor (its *dependents*) `completed + skipped`, and those
/// ancestors never execute their own sequence.
#[tokio::test]
async fn s3_timing_gate_skips_dependent_ancestors() {
    let concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "total", "number"),
        ConceptEntry::new("2", "mid", "number"),
        ConceptEntry::new("3", "gate", "bool"),
    ]);
    // "total" (flow "1") and "mid" (flow "1.1") are both ancestors of the
    // timing gate nested three levels deep at flow "1.1.1".
    let total = InferenceEntry::new("1", "assigning.copy", "total", "1").with_value_concepts(vec!["mid".to_string()]);
    let mid = InferenceEntry::new("2", "assigning.copy", "mid", "1.1").with_value_concepts(vec!["gate".to_string()]);
    let gate = InferenceEntry::new("3", "timing.if", "gate", "1.1.1").with_value_concepts(vec![]);
    let inferences = InferenceRepo::new(vec![total, mid, gate]);

    let never_called = Arc::new(ScriptedSequence::new(vec![]));
    let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
    sequences.insert(
        "timing.if".to_string(),
        Arc::new(ScriptedSequence::new(vec![SequenceOutcome::TimingGate { ready: true, skip_children: true }])),
    );
    sequences.insert("assigning.copy".to_string(), never_called.clone());

    let mut orch = orchestrator("s3", concepts, inferences, sequences, 10);
    let (_control, watcher) = RunControl::new();
    let outcome = orch.run(watcher).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    for id in ["1", "2"] {
        assert_eq!(orch.blackboard().item_status(id), ItemStatus::Completed, "item {id} should be completed-by-skip");
        assert_eq!(orch.blackboard().item_result(id), Some(&CompletionDetail::Skipped), "item {id} should carry the skipped detail");
    }
    assert_eq!(orch.blackboard().item_status("3"), ItemStatus::Completed);
    assert_eq!(never_called.calls(), 0, "skipped dependents must never invoke their own sequence");
}

/// S4: an `is_invariant` supporter survives an iteration reset untouched;
/// a non-invariant peer is cleared back to pending/empty.
#[tokio::test]
async fn s4_invariant_concept_preserved_across_iteration_reset() {
    let concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "digits", "list"),
        ConceptEntry::new("2", "digit", "number"),
        ConceptEntry::new("3", "base", "number").with_invariant(true),
    ]);
    let loop_item = InferenceEntry::new("1", "quantifying.each", "digits", "1").with_value_concepts(vec![]);
    let digit_item = InferenceEntry::new("2", "assigning.copy", "digit", "1.1").with_value_concepts(vec![]);
    let base_item = InferenceEntry::new("3", "assigning.copy", "base", "1.2").with_value_concepts(vec![]);
    let inferences = InferenceRepo::new(vec![loop_item, digit_item, base_item]);

    let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
    sequences.insert(
        "quantifying.each".to_string(),
        Arc::new(ScriptedSequence::new(vec![
            SequenceOutcome::IterationReset { reference: None, workspace_key: None },
            SequenceOutcome::Completed {
                writes: vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Int(3)))],
                condition_met: None,
                truth_mask: None,
            },
        ])),
    );
    sequences.insert(
        "assigning.copy".to_string(),
        Arc::new(ScriptedSequence::new(vec![
            SequenceOutcome::Completed {
                writes: vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Int(1)))],
                condition_met: None,
                truth_mask: None,
            },
            SequenceOutcome::Completed {
                writes: vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Int(10)))],
                condition_met: None,
                truth_mask: None,
            },
            SequenceOutcome::Completed {
                writes: vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Int(2)))],
                condition_met: None,
                truth_mask: None,
            },
        ])),
    );

    let mut orch = orchestrator("s4", concepts, inferences, sequences, 10);
    let (_control, watcher) = RunControl::new();
    let outcome = orch.run(watcher).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(orch.blackboard().concept_status("base"), ConceptStatus::Complete);
    assert_eq!(orch.concepts().get("base").unwrap().reference, Some(Reference::scalar(Value::Int(10))));
    assert_eq!(orch.concepts().get("digit").unwrap().reference, Some(Reference::scalar(Value::Int(2))));
}

/// S5: checkpoint a completed run, reconcile it into a fresh orchestrator,
/// and confirm tracker counters and concept state come back identical.
#[tokio::test]
async fn s5_checkpoint_round_trip() {
    let concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "a", "number").with_ground_concept(true),
        ConceptEntry::new("2", "total", "number").with_final_concept(true),
    ]);
    let inferences = InferenceRepo::new(vec![InferenceEntry::new("1", "assigning.copy", "total", "1.1").with_value_concepts(vec!["a".to_string()])]);

    let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
    sequences.insert(
        "assigning.copy".to_string(),
        Arc::new(ScriptedSequence::new(vec![SequenceOutcome::Completed {
            writes: vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Int(7)))],
            condition_met: None,
            truth_mask: None,
        }])),
    );

    let mut orch = orchestrator("s5", concepts, inferences, sequences, 10);
    let (_control, watcher) = RunControl::new();
    orch.run(watcher).await.unwrap();

    let store = Arc::new(CheckpointStore::open_in_memory().unwrap());
    let manager = CheckpointManager::new(store);
    manager
        .save(
            orch.run_id(),
            orch.tracker().cycle_count,
            orch.tracker().total_executions,
            orch.concepts(),
            orch.inferences(),
            orch.blackboard(),
            orch.tracker(),
            orch.workspace(),
        )
        .unwrap();
    let blob = manager.load("s5", None, None).unwrap().unwrap();

    let fresh_concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "a", "number").with_ground_concept(true),
        ConceptEntry::new("2", "total", "number").with_final_concept(true),
    ]);
    let fresh_inferences = InferenceRepo::new(vec![InferenceEntry::new("1", "assigning.copy", "total", "1.1").with_value_concepts(vec!["a".to_string()])]);
    let mut fresh = orchestrator("s5", fresh_concepts, fresh_inferences, HashMap::new(), 10);
    fresh.reconcile_checkpoint(&blob, ReconciliationMode::Patch, None);

    assert_eq!(fresh.tracker().cycle_count, orch.tracker().cycle_count);
    assert_eq!(fresh.tracker().completion_order, orch.tracker().completion_order);
    assert_eq!(fresh.blackboard().item_status("1"), ItemStatus::Completed);
    assert_eq!(fresh.concepts().get("total").unwrap().reference, Some(Reference::scalar(Value::Int(7))));
}

/// S6: forking a checkpoint under a new run id starts a fresh tracker
/// history while installing the same concept/item state.
#[tokio::test]
async fn s6_fork_preserves_state_but_resets_tracker() {
    let concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "a", "number").with_ground_concept(true),
        ConceptEntry::new("2", "total", "number"),
    ]);
    let inferences = InferenceRepo::new(vec![InferenceEntry::new("1", "assigning.copy", "total", "1.1").with_value_concepts(vec!["a".to_string()])]);

    let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
    sequences.insert(
        "assigning.copy".to_string(),
        Arc::new(ScriptedSequence::new(vec![SequenceOutcome::Completed {
            writes: vec![ConceptWrite::to_inferred_concept(Reference::scalar(Value::Int(42)))],
            condition_met: None,
            truth_mask: None,
        }])),
    );

    let mut r1 = orchestrator("r1", concepts, inferences, sequences, 10);
    let (_control, watcher) = RunControl::new();
    r1.run(watcher).await.unwrap();
    let blob = r1.checkpoint_blob();

    let fork_concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "a", "number").with_ground_concept(true),
        ConceptEntry::new("2", "total", "number"),
    ]);
    let fork_inferences = InferenceRepo::new(vec![InferenceEntry::new("1", "assigning.copy", "total", "1.1").with_value_concepts(vec!["a".to_string()])]);
    let mut r2 = orchestrator("r1", fork_concepts, fork_inferences, HashMap::new(), 10);
    r2.reconcile_checkpoint(&blob, ReconciliationMode::Overwrite, Some("r2".to_string()));

    assert_eq!(r2.run_id(), "r2");
    assert_eq!(r2.tracker().cycle_count, 0);
    assert_eq!(r2.concepts().get("total").unwrap().reference, Some(Reference::scalar(Value::Int(42))));
    assert_eq!(r2.blackboard().item_status("1"), ItemStatus::Completed);
}

/// Invariant 3: restarting from a mid-run checkpoint and continuing to
/// cycle n produces the same final concepts as an uninterrupted run,
/// given the same repos and deterministic sequence outputs.
#[tokio::test]
async fn invariant_3_checkpoint_restart_matches_uninterrupted_run() {
    fn build_repo() -> (ConceptRepo, InferenceRepo) {
        let concepts = ConceptRepo::new(vec![
            ConceptEntry::new("1", "a", "number")
                .with_ground_concept(true)
                .with_reference(Reference::scalar(Value::Int(5))),
            ConceptEntry::new("2", "mid", "number"),
            ConceptEntry::new("3", "total", "number").with_final_concept(true),
        ]);
        // "total" is given the earlier flow index so its first visit each
        // cycle lands before "mid" has a chance to complete that same
        // cycle, forcing the chain to take two cycles instead of
        // cascading through in one.
        let inferences = InferenceRepo::new(vec![
            InferenceEntry::new("1", "assigning.copy", "total", "1").with_value_concepts(vec!["mid".to_string()]),
            InferenceEntry::new("2", "assigning.copy", "mid", "2").with_value_concepts(vec!["a".to_string()]),
        ]);
        (concepts, inferences)
    }

    fn build_sequences() -> HashMap<String, Arc<dyn Sequence>> {
        let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
        sequences.insert("assigning.copy".to_string(), Arc::new(CopySequence));
        sequences
    }

    let (concepts, inferences) = build_repo();
    let mut uninterrupted = orchestrator("u", concepts, inferences, build_sequences(), 10);
    let (_control, watcher) = RunControl::new();
    let expected = uninterrupted.run(watcher).await.unwrap();

    let (concepts, inferences) = build_repo();
    let mut first_half = orchestrator("u", concepts, inferences, build_sequences(), 1);
    let (_control, watcher) = RunControl::new();
    first_half.run(watcher).await.unwrap();
    let blob = first_half.checkpoint_blob();

    let (concepts, inferences) = build_repo();
    let mut resumed = orchestrator("u", concepts, inferences, build_sequences(), 10);
    resumed.reconcile_checkpoint(&blob, ReconciliationMode::Overwrite, None);
    let (_control, watcher) = RunControl::new();
    let resumed_outcome = resumed.run(watcher).await.unwrap();

    match (expected, resumed_outcome) {
        (RunOutcome::Completed { final_concepts: a }, RunOutcome::Completed { final_concepts: b }) => assert_eq!(a, b),
        other => panic!("expected both runs to complete: {other:?}"),
    }
    assert_eq!(uninterrupted.concepts().get("total").unwrap().reference, resumed.concepts().get("total").unwrap().reference);
}

/// Invariant 6: skip propagation from a timing node marks exactly its
/// flow-index ancestor chain (its *dependents*) as `completed+skipped`,
/// and nothing outside that chain — a sibling branch completes normally.
#[tokio::test]
async fn invariant_6_skip_propagation_exact_dependent_set() {
    let concepts = ConceptRepo::new(vec![
        ConceptEntry::new("1", "total", "number"),
        ConceptEntry::new("2", "mid", "number"),
        ConceptEntry::new("3", "gate", "bool"),
        ConceptEntry::new("4", "outside", "number")
            .with_ground_concept(true)
            .with_reference(Reference::scalar(Value::Int(9))),
        ConceptEntry::new("5", "sibling_total", "number"),
    ]);
    // "total" (flow "1") and "mid" (flow "1.1") are the ancestor chain
    // above the gate at "1.1.1"; "sibling_total" (flow "2") is outside it.
    let total = InferenceEntry::new("1", "assigning.copy", "total", "1").with_value_concepts(vec!["mid".to_string()]);
    let mid = InferenceEntry::new("2", "assigning.copy", "mid", "1.1").with_value_concepts(vec!["gate".to_string()]);
    let gate = InferenceEntry::new("3", "timing.if", "gate", "1.1.1").with_value_concepts(vec![]);
    let sibling = InferenceEntry::new("4", "assigning.copy", "sibling_total", "2").with_value_concepts(vec!["outside".to_string()]);
    let inferences = InferenceRepo::new(vec![total, mid, gate, sibling]);

    let mut sequences: HashMap<String, Arc<dyn Sequence>> = HashMap::new();
    sequences.insert(
        "timing.if".to_string(),
        Arc::new(ScriptedSequence::new(vec![SequenceOutcome::TimingGate { ready: true, skip_children: true }])),
    );
    sequences.insert("assigning.copy".to_string(), Arc::new(CopySequence));

    let mut orch = orchestrator("inv6", concepts, inferences, sequences, 10);
    let (_control, watcher) = RunControl::new();
    orch.run(watcher).await.unwrap();

    assert_eq!(orch.blackboard().item_status("1"), ItemStatus::Completed);
    assert_eq!(orch.blackboard().item_result("1"), Some(&CompletionDetail::Skipped));
    assert_eq!(orch.blackboard().item_status("2"), ItemStatus::Completed);
    assert_eq!(orch.blackboard().item_result("2"), Some(&CompletionDetail::Skipped));
    assert_eq!(orch.blackboard().item_status("3"), ItemStatus::Completed);
    assert_eq!(orch.blackboard().item_status("4"), ItemStatus::Completed);
    assert_eq!(orch.concepts().get("sibling_total").unwrap().reference, Some(Reference::scalar(Value::Int(9))));
}
