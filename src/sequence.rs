//! The `Sequence` trait — the seam where an inference's actual computation
//! happens. Sequence implementations themselves are out of scope here; this
//! module only defines the contract the orchestrator drives.

use async_trait::async_trait;

use crate::reference::Reference;

/// Everything a sequence needs to run one execution of an inference.
#[derive(Clone, Debug)]
pub struct SequenceInput {
    pub concept_to_infer: String,
    pub function: Option<Reference>,
    pub values: Vec<(String, Reference)>,
    pub contexts: Vec<(String, Reference)>,
    pub execution_count: u32,
    /// Mirrors the orchestrator's `RunConfig::dev_mode`. A sequence calling
    /// into `Reference`'s cross-product/tensor/filter operations should
    /// pass this through so they raise or skip consistently with the rest
    /// of the run.
    pub dev_mode: bool,
}

/// One resolved write back to a concept, mirroring an `OR`-step record
/// from the sequence contract: `concept` names the target explicitly, or
/// defaults to the item's own `concept_to_infer` when `None`.
#[derive(Clone, Debug)]
pub struct ConceptWrite {
    pub concept: Option<String>,
    pub reference: Reference,
}

impl ConceptWrite {
    /// A write that lands on the item's own inferred concept.
    pub fn to_inferred_concept(reference: Reference) -> Self {
        Self { concept: None, reference }
    }

    /// A write that lands on an explicitly named concept — used by
    /// sequences producing inference/context/values/function-category
    /// records that each name their own target.
    pub fn to_concept(concept: impl Into<String>, reference: Reference) -> Self {
        Self {
            concept: Some(concept.into()),
            reference,
        }
    }
}

/// What a sequence reports back after one execution.
///
/// Modeled as a sum type rather than an exception: `NeedsUserInteraction`
/// is a normal outcome the orchestrator must route back to its caller, not
/// a failure path.
#[derive(Clone, Debug)]
pub enum SequenceOutcome {
    /// The inference produced one or more writes back to ConceptRepo —
    /// usually just the item's own inferred concept, but a sequence whose
    /// states carry records for more than one category (inference,
    /// context, values, function) can name a distinct target concept per
    /// write. `condition_met` is set only for judgement sequences;
    /// `truth_mask`, if the sequence computed one, is stored on the
    /// blackboard as-is and never recomputed by the orchestrator.
    Completed {
        writes: Vec<ConceptWrite>,
        condition_met: Option<bool>,
        truth_mask: Option<Reference>,
    },
    /// Outcome specific to timing-gate sequences: whether downstream items
    /// may proceed, and whether they should instead be skipped.
    TimingGate { ready: bool, skip_children: bool },
    /// Outcome specific to quantifying/looping sequences that have not yet
    /// finished iterating. `reference`, if given, is applied to the item's
    /// own concept without marking it complete — the loop's accumulator
    /// value so far. Every item whose flow index is a descendant of this
    /// one is reset to pending with its execution count zeroed, and its
    /// concept cleared back to empty, unless that concept is `is_invariant`
    /// (which keeps both its reference and `complete` status). The item
    /// itself stays pending to run again next cycle. `workspace_key`, if
    /// given, is removed from the run's workspace.
    IterationReset {
        reference: Option<Reference>,
        workspace_key: Option<String>,
    },
    /// A transient failure; the orchestrator should retry the item on a
    /// later cycle rather than fail the run.
    Retry { reason: String },
    /// A non-retryable failure.
    Failed { message: String },
    /// The sequence needs input from outside the orchestrator (e.g. a
    /// human approval) before it can proceed.
    NeedsUserInteraction { prompt: String },
}

/// A sequence implementation: given an inference's resolved inputs,
/// produces an outcome. Implementations are collaborators supplied by the
/// embedding application; the orchestrator only ever calls `execute`.
#[async_trait]
pub trait Sequence: Send + Sync {
    async fn execute(&self, input: SequenceInput) -> SequenceOutcome;
}
