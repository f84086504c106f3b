//! `ConceptEntry` — the persisted definition of one concept.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::reference::{Reference, Value};

/// The definition of a single concept, as loaded from the concept
/// repository file. Holds the concept's metadata plus whatever
/// [`Reference`] value it currently carries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConceptEntry {
    pub id: String,
    pub concept_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub context: String,
    pub axis_name: Option<String>,
    pub natural_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_ground_concept: bool,
    #[serde(default)]
    pub is_final_concept: bool,
    /// Prevents the orchestrator from resetting this concept's reference
    /// during a quantifying-loop reset.
    #[serde(default)]
    pub is_invariant: bool,
    /// Flow indices this concept is the inferred output of. A concept can
    /// appear under more than one flow index when it is produced by
    /// different branches of the same run.
    #[serde(default)]
    pub flow_indices: Vec<String>,
    #[serde(skip)]
    pub reference: Option<Reference>,

    /// Ground concept's initial value, as a plain nested-list JSON
    /// document. Consumed by `ConceptRepo::from_json_str` to build
    /// `reference` and then discarded; never itself serialized back out.
    #[serde(default, rename = "reference_data", skip_serializing)]
    pub(crate) reference_data: Option<serde_json::Value>,
    #[serde(default, rename = "reference_axis_names", skip_serializing)]
    pub(crate) reference_axis_names: Option<Vec<String>>,
}

impl ConceptEntry {
    pub fn new(id: impl Into<String>, concept_name: impl Into<String>, kind: impl Into<String>) -> Self {
        let concept_name = concept_name.into();
        let id = id.into();
        debug!(%id, %concept_name, "ConceptEntry::new");
        Self {
            id,
            concept_name,
            kind: kind.into(),
            context: String::new(),
            axis_name: None,
            natural_name: None,
            description: None,
            is_ground_concept: false,
            is_final_concept: false,
            is_invariant: false,
            flow_indices: Vec::new(),
            reference: None,
            reference_data: None,
            reference_axis_names: None,
        }
    }

    /// Build the `reference` field from `reference_data`/
    /// `reference_axis_names`, as loaded from a repo JSON file. No-op if
    /// `reference_data` is absent.
    pub(crate) fn materialize_reference(&mut self) -> Result<(), String> {
        let Some(data) = self.reference_data.take() else {
            return Ok(());
        };
        let axis_names = self.reference_axis_names.take();
        let value = Value::from_untagged_json(data)?;
        let reference = Reference::from_nested(value, axis_names).map_err(|e| e.to_string())?;
        self.reference = Some(reference);
        Ok(())
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_ground_concept(mut self, is_ground: bool) -> Self {
        self.is_ground_concept = is_ground;
        self
    }

    pub fn with_final_concept(mut self, is_final: bool) -> Self {
        self.is_final_concept = is_final;
        self
    }

    pub fn with_invariant(mut self, is_invariant: bool) -> Self {
        self.is_invariant = is_invariant;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Deterministic hash of the fields that define this concept's
    /// meaning, used to detect whether a concept's definition changed
    /// between a checkpoint and the repository it's being resumed against.
    pub fn signature(&self) -> String {
        let signature_data = serde_json::json!({
            "concept_name": self.concept_name,
            "type": self.kind,
            "context": self.context,
            "axis_name": self.axis_name,
            "natural_name": self.natural_name,
            "is_ground_concept": self.is_ground_concept,
            "is_invariant": self.is_invariant,
            "flow_indices": self.flow_indices,
        });
        let mut hasher = Sha256::new();
        hasher.update(signature_data.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
