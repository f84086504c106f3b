//! `ConceptRepo` — arena-indexed collection of [`ConceptEntry`] values.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::reference::Reference;

use super::entry::ConceptEntry;

/// Owns all [`ConceptEntry`] values for a run and indexes them by name.
///
/// Concepts reference inference entries and vice versa in the original
/// model; representing both as indices into an arena (rather than as
/// `Rc<RefCell<_>>` cycles) keeps ownership simple and mutation explicit.
#[derive(Debug, Default)]
pub struct ConceptRepo {
    entries: Vec<ConceptEntry>,
    by_name: HashMap<String, usize>,
}

impl ConceptRepo {
    pub fn new(entries: Vec<ConceptEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_name.insert(entry.concept_name.clone(), i);
        }
        debug!(count = entries.len(), "ConceptRepo::new");
        Self { entries, by_name }
    }

    /// Load a repo from the JSON array shape of a `concepts.json` repo
    /// file. Ground concepts carrying `reference_data` have their initial
    /// `Reference` built eagerly.
    pub fn from_json_str(json: &str) -> OrchestratorResult<Self> {
        let mut entries: Vec<ConceptEntry> = serde_json::from_str(json).map_err(|e| OrchestratorError::MalformedRepo {
            path: "concepts.json".to_string(),
            reason: e.to_string(),
        })?;
        for entry in &mut entries {
            entry.materialize_reference().map_err(|reason| OrchestratorError::MalformedRepo {
                path: "concepts.json".to_string(),
                reason: format!("concept '{}': {reason}", entry.concept_name),
            })?;
        }
        Ok(Self::new(entries))
    }

    pub fn get(&self, name: &str) -> Option<&ConceptEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ConceptEntry> {
        let i = *self.by_name.get(name)?;
        Some(&mut self.entries[i])
    }

    pub fn all(&self) -> &[ConceptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach a reference value to a named concept, replacing any existing
    /// one. Returns an error if the concept doesn't exist.
    pub fn set_reference(&mut self, name: &str, reference: Reference) -> OrchestratorResult<()> {
        let entry = self
            .get_mut(name)
            .ok_or_else(|| OrchestratorError::ConceptNotFound(name.to_string()))?;
        debug!(concept = name, "ConceptRepo::set_reference");
        entry.reference = Some(reference);
        Ok(())
    }

    /// Clear a concept's reference, used when a quantifying-loop reset
    /// rolls a non-invariant supporting concept back to pending.
    pub fn clear_reference(&mut self, name: &str) -> OrchestratorResult<()> {
        let entry = self
            .get_mut(name)
            .ok_or_else(|| OrchestratorError::ConceptNotFound(name.to_string()))?;
        entry.reference = None;
        Ok(())
    }
}
