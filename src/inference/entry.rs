//! `InferenceEntry` — one schedulable unit of work.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// The definition of one inference: what it infers, what it reads from, and
/// under what bypass conditions it may run before its usual prerequisites
/// are satisfied.
///
/// The six `start_*` flags independently bypass a piece of the readiness
/// check; they are not a priority chain, and more than one may be set on
/// the same entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceEntry {
    pub id: String,
    /// Name of the sequence implementation this inference runs, e.g.
    /// `"judgement.compare"` or `"assigning.copy"`.
    pub inference_sequence: String,
    pub concept_to_infer: String,
    /// Dot-notation position in the flow hierarchy, e.g. `"1.6"` or
    /// `"1.7.2"`. Determines waitlist ordering and supporting-item lookup.
    pub flow_index: String,
    pub function_concept: Option<String>,
    #[serde(default)]
    pub value_concepts: Vec<String>,
    #[serde(default)]
    pub context_concepts: Vec<String>,

    #[serde(default)]
    pub start_without_value: bool,
    #[serde(default)]
    pub start_without_value_only_once: bool,
    #[serde(default)]
    pub start_without_function: bool,
    #[serde(default)]
    pub start_without_function_only_once: bool,
    /// Always bypasses the supporting-items-complete check, regardless of
    /// execution count.
    #[serde(default)]
    pub start_with_support_reference_only: bool,
    /// Bypasses the supporting-items-complete check only on this item's
    /// first execution.
    #[serde(default)]
    pub start_without_support_reference_only_once: bool,

    /// Opaque syntax metadata from the originating parse, consulted for a
    /// handful of sequence-specific readiness rules (e.g. `assigning`'s
    /// `syntax.assign_source` list of candidate value concepts).
    #[serde(default)]
    pub working_interpretation: Option<serde_json::Value>,
}

impl InferenceEntry {
    pub fn new(
        id: impl Into<String>,
        inference_sequence: impl Into<String>,
        concept_to_infer: impl Into<String>,
        flow_index: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let flow_index = flow_index.into();
        debug!(%id, %flow_index, "InferenceEntry::new");
        Self {
            id,
            inference_sequence: inference_sequence.into(),
            concept_to_infer: concept_to_infer.into(),
            flow_index,
            function_concept: None,
            value_concepts: Vec::new(),
            context_concepts: Vec::new(),
            start_without_value: false,
            start_without_value_only_once: false,
            start_without_function: false,
            start_without_function_only_once: false,
            start_with_support_reference_only: false,
            start_without_support_reference_only_once: false,
            working_interpretation: None,
        }
    }

    pub fn with_function_concept(mut self, name: impl Into<String>) -> Self {
        self.function_concept = Some(name.into());
        self
    }

    pub fn with_value_concepts(mut self, names: Vec<String>) -> Self {
        self.value_concepts = names;
        self
    }

    pub fn with_context_concepts(mut self, names: Vec<String>) -> Self {
        self.context_concepts = names;
        self
    }

    /// True when the inference's sequence starts the `"judgement"` family,
    /// whose completion is reported via a condition-met/not-met outcome
    /// rather than a plain success/failure.
    pub fn is_judgement(&self) -> bool {
        self.inference_sequence.starts_with("judgement")
    }

    /// Candidate value-concept names for an `"assigning"` sequence's
    /// "only one source need be ready" readiness rule, if present.
    pub fn assign_source_names(&self) -> Option<Vec<String>> {
        if self.inference_sequence != "assigning" {
            return None;
        }
        self.working_interpretation
            .as_ref()?
            .get("syntax")?
            .get("assign_source")?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    }

    /// Deterministic hash of the fields that define this inference's
    /// behavior, used to detect whether an inference's definition changed
    /// between a checkpoint and the repository it's being resumed against.
    pub fn signature(&self) -> String {
        let signature_data = serde_json::json!({
            "inference_sequence": self.inference_sequence,
            "concept_to_infer": self.concept_to_infer,
            "flow_index": self.flow_index,
            "function_concept": self.function_concept,
            "value_concepts": self.value_concepts,
            "context_concepts": self.context_concepts,
            "start_without_value": self.start_without_value,
            "start_without_value_only_once": self.start_without_value_only_once,
            "start_without_function": self.start_without_function,
            "start_without_function_only_once": self.start_without_function_only_once,
            "start_with_support_reference_only": self.start_with_support_reference_only,
            "start_without_support_reference_only_once": self.start_without_support_reference_only_once,
        });
        let mut hasher = Sha256::new();
        hasher.update(signature_data.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judgement_prefix_is_detected() {
        let entry = InferenceEntry::new("1", "judgement.compare", "result", "1.1");
        assert!(entry.is_judgement());
    }

    #[test]
    fn non_judgement_sequence_is_not_judgement() {
        let entry = InferenceEntry::new("1", "assigning.copy", "result", "1.1");
        assert!(!entry.is_judgement());
    }

    #[test]
    fn assign_source_names_reads_nested_syntax() {
        let mut entry = InferenceEntry::new("1", "assigning", "total", "1.1");
        entry.working_interpretation = Some(serde_json::json!({
            "syntax": { "assign_source": ["a", "b"] }
        }));
        assert_eq!(entry.assign_source_names(), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn assign_source_names_is_none_for_other_sequences() {
        let entry = InferenceEntry::new("1", "assigning.copy", "total", "1.1");
        assert_eq!(entry.assign_source_names(), None);
    }

    #[test]
    fn signature_is_stable_across_equivalent_entries() {
        let a = InferenceEntry::new("1", "assigning.copy", "total", "1.1");
        let b = InferenceEntry::new("2", "assigning.copy", "total", "1.1");
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn signature_changes_with_bypass_flags() {
        let a = InferenceEntry::new("1", "assigning.copy", "total", "1.1");
        let mut b = a.clone();
        b.start_with_support_reference_only = true;
        assert_ne!(a.signature(), b.signature());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_entry() -> impl Strategy<Value = (String, String, Vec<String>, bool)> {
            (
                "[a-z.]{1,8}",
                "[a-z0-9.]{1,5}",
                prop::collection::vec("[a-z]{1,6}", 0..=3),
                any::<bool>(),
            )
        }

        proptest! {
            /// Two entries with identical meaning-bearing fields hash equal
            /// regardless of builder/field-assignment order or the
            /// non-meaning-bearing `id`.
            #[test]
            fn signature_ignores_assignment_order_and_id((sequence, flow_index, values, bypass) in arb_entry()) {
                let mut a = InferenceEntry::new("id-a", sequence.clone(), "total", flow_index.clone());
                a.value_concepts = values.clone();
                a.start_with_support_reference_only = bypass;

                let mut b = InferenceEntry::new("id-b", sequence, "total", flow_index);
                b.start_with_support_reference_only = bypass;
                b.value_concepts = values;

                prop_assert_eq!(a.signature(), b.signature());
            }

            /// Flipping a bypass flag always changes the signature.
            #[test]
            fn signature_changes_when_bypass_flips((sequence, flow_index, values, bypass) in arb_entry()) {
                let mut a = InferenceEntry::new("1", sequence, "total", flow_index);
                a.value_concepts = values;
                a.start_with_support_reference_only = bypass;

                let mut b = a.clone();
                b.start_with_support_reference_only = !bypass;

                prop_assert_ne!(a.signature(), b.signature());
            }
        }
    }
}
