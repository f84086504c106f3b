//! `InferenceRepo` — arena-indexed collection of [`InferenceEntry`] values.

use std::collections::HashMap;

use tracing::debug;

use crate::concept::ConceptRepo;
use crate::error::{OrchestratorError, OrchestratorResult};

use super::entry::InferenceEntry;

/// Owns all [`InferenceEntry`] values for a run and indexes them by
/// flow index.
#[derive(Debug, Default)]
pub struct InferenceRepo {
    entries: Vec<InferenceEntry>,
    by_flow_index: HashMap<String, usize>,
}

impl InferenceRepo {
    pub fn new(entries: Vec<InferenceEntry>) -> Self {
        let mut by_flow_index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_flow_index.insert(entry.flow_index.clone(), i);
        }
        debug!(count = entries.len(), "InferenceRepo::new");
        Self { entries, by_flow_index }
    }

    /// Load a repo from a `inferences.json` array, validating that every
    /// named concept (`concept_to_infer`, `function_concept`,
    /// `value_concepts`, `context_concepts`) resolves against `concepts`.
    pub fn from_json_str(json: &str, concepts: &ConceptRepo) -> OrchestratorResult<Self> {
        let entries: Vec<InferenceEntry> = serde_json::from_str(json).map_err(|e| OrchestratorError::MalformedRepo {
            path: "inferences.json".to_string(),
            reason: e.to_string(),
        })?;

        for entry in &entries {
            Self::require_known(concepts, &entry.concept_to_infer)?;
            if let Some(function_concept) = &entry.function_concept {
                Self::require_known(concepts, function_concept)?;
            }
            for name in entry.value_concepts.iter().chain(entry.context_concepts.iter()) {
                Self::require_known(concepts, name)?;
            }
        }

        Ok(Self::new(entries))
    }

    fn require_known(concepts: &ConceptRepo, name: &str) -> OrchestratorResult<()> {
        if concepts.get(name).is_none() {
            return Err(OrchestratorError::MalformedRepo {
                path: "inferences.json".to_string(),
                reason: format!("references unknown concept: {name}"),
            });
        }
        Ok(())
    }

    pub fn get_by_flow_index(&self, flow_index: &str) -> Option<&InferenceEntry> {
        self.by_flow_index.get(flow_index).map(|&i| &self.entries[i])
    }

    pub fn get_mut_by_flow_index(&mut self, flow_index: &str) -> Option<&mut InferenceEntry> {
        let i = *self.by_flow_index.get(flow_index)?;
        Some(&mut self.entries[i])
    }

    pub fn all(&self) -> &[InferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
