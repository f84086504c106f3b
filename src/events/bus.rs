//! Event bus - central pub/sub system for orchestrator activity.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::OrchestratorEvent;

/// Default channel capacity (events).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Central event bus for orchestrator activity streaming.
///
/// Every cycle, item transition, and checkpoint save emits to this bus.
/// Consumers (a host UI, a file logger) subscribe to receive events.
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
    #[allow(dead_code)]
    channel_capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            channel_capacity: capacity,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers. Fire-and-forget: if there are no
    /// subscribers the event is dropped.
    pub fn emit(&self, event: OrchestratorEvent) {
        debug!(event_type = event.event_type(), run_id = event.run_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to a specific run.
    pub fn emitter_for(&self, run_id: impl Into<String>) -> EventEmitter {
        let run_id = run_id.into();
        debug!(%run_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            run_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for orchestrator internals to emit events without owning the bus.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<OrchestratorEvent>,
    run_id: String,
}

impl EventEmitter {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, event: OrchestratorEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    pub fn run_started(&self, root_concept: &str) {
        self.emit(OrchestratorEvent::RunStarted {
            run_id: self.run_id.clone(),
            root_concept: root_concept.to_string(),
        });
    }

    pub fn cycle_completed(&self, cycle: u64, ready_count: usize, waiting_count: usize) {
        self.emit(OrchestratorEvent::CycleCompleted {
            run_id: self.run_id.clone(),
            cycle,
            ready_count,
            waiting_count,
        });
    }

    pub fn item_transitioned(&self, item_id: &str, from: &str, to: &str) {
        self.emit(OrchestratorEvent::ItemTransitioned {
            run_id: self.run_id.clone(),
            item_id: item_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn item_skipped(&self, item_id: &str, reason: &str) {
        self.emit(OrchestratorEvent::ItemSkipped {
            run_id: self.run_id.clone(),
            item_id: item_id.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn checkpoint_saved(&self, cycle: u64, signature: &str) {
        self.emit(OrchestratorEvent::CheckpointSaved {
            run_id: self.run_id.clone(),
            cycle,
            signature: signature.to_string(),
        });
    }

    pub fn run_completed(&self, success: bool, cycles: u64) {
        self.emit(OrchestratorEvent::RunCompleted {
            run_id: self.run_id.clone(),
            success,
            cycles,
        });
    }

    pub fn sequence_error(&self, item_id: &str, message: &str) {
        self.emit(OrchestratorEvent::SequenceError {
            run_id: self.run_id.clone(),
            item_id: item_id.to_string(),
            message: message.to_string(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership.
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
