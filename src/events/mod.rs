//! Event bus for live observability of orchestrator runs.
//!
//! Every cycle boundary, item transition, and checkpoint save emits an
//! [`OrchestratorEvent`] onto a `tokio::sync::broadcast` channel. This is
//! the seam a host UI or a file logger subscribes to; the orchestrator
//! itself only ever calls [`EventEmitter::emit`] and its convenience
//! wrappers, and never reads back from the bus.

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use types::{EventLogEntry, OrchestratorEvent};
