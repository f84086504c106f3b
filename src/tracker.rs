//! `ProcessTracker` — execution history and run statistics.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::blackboard::Blackboard;
use crate::concept::ConceptRepo;
use crate::waitlist::Waitlist;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub cycle: u64,
    pub flow_index: String,
    pub inference_sequence: String,
    pub status: String,
    pub concept_inferred: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProcessTracker {
    pub execution_history: Vec<ExecutionRecord>,
    pub completion_order: Vec<String>,
    pub cycle_count: u64,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
    pub retry_count: u64,
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_execution_record(
        &mut self,
        cycle: u64,
        flow_index: impl Into<String>,
        inference_sequence: impl Into<String>,
        status: impl Into<String>,
        concept_inferred: impl Into<String>,
    ) {
        let status = status.into();
        self.total_executions += 1;
        match status.as_str() {
            "completed" => self.successful_executions += 1,
            "skipped" => self.skipped_count += 1,
            "failed" => self.failed_count += 1,
            _ => {}
        }
        self.execution_history.push(ExecutionRecord {
            cycle,
            flow_index: flow_index.into(),
            inference_sequence: inference_sequence.into(),
            status,
            concept_inferred: concept_inferred.into(),
        });
    }

    pub fn record_retry(&mut self) {
        self.retry_count += 1;
    }

    pub fn record_completion(&mut self, flow_index: impl Into<String>) {
        self.completion_order.push(flow_index.into());
    }

    pub fn advance_cycle(&mut self) {
        self.cycle_count += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.successful_executions as f64 / self.total_executions as f64
    }

    /// Log a structured summary of waitlist and process state: per-item
    /// status, aggregate counters, completion order, and final-concept
    /// reference shapes.
    pub fn log_summary(&self, waitlist: &Waitlist, blackboard: &Blackboard, concepts: &ConceptRepo) {
        let mut items: Vec<_> = waitlist.items().iter().collect();
        items.sort_by_key(|item| item.flow_index().to_string());
        for item in items {
            info!(
                flow_index = item.flow_index(),
                status = ?blackboard.item_status(item.id()),
                "item status"
            );
        }

        info!(
            cycles = self.cycle_count,
            total_executions = self.total_executions,
            successful_executions = self.successful_executions,
            skipped = self.skipped_count,
            failed = self.failed_count,
            retries = self.retry_count,
            success_rate = self.success_rate(),
            "process statistics"
        );
        info!(order = ?self.completion_order, "completion order");

        for concept in concepts.all().iter().filter(|c| c.is_final_concept) {
            if let Some(reference) = &concept.reference {
                info!(
                    concept = concept.concept_name,
                    axes = ?reference.axis_names(),
                    shape = ?reference.shape(),
                    "final concept reference"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_with_no_executions() {
        let tracker = ProcessTracker::new();
        assert_eq!(tracker.success_rate(), 0.0);
    }

    #[test]
    fn success_rate_reflects_mixed_outcomes() {
        let mut tracker = ProcessTracker::new();
        tracker.add_execution_record(1, "1.1", "assigning.copy", "completed", "total");
        tracker.add_execution_record(1, "1.2", "assigning.copy", "failed", "other");
        assert_eq!(tracker.success_rate(), 0.5);
        assert_eq!(tracker.total_executions, 2);
        assert_eq!(tracker.successful_executions, 1);
        assert_eq!(tracker.failed_count, 1);
    }

    #[test]
    fn skipped_executions_are_counted_separately() {
        let mut tracker = ProcessTracker::new();
        tracker.add_execution_record(1, "1.1", "skip-propagation", "skipped", "total");
        assert_eq!(tracker.skipped_count, 1);
        assert_eq!(tracker.successful_executions, 0);
    }

    #[test]
    fn completion_order_tracks_insertion() {
        let mut tracker = ProcessTracker::new();
        tracker.record_completion("1.2");
        tracker.record_completion("1.1");
        assert_eq!(tracker.completion_order, vec!["1.2", "1.1"]);
    }
}
