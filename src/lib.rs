//! normcode-orchestrator - dependency-driven inference orchestrator
//!
//! Drives a dependency graph of NormCode inferences to completion: concepts
//! hold typed values, inferences consume some concepts and produce others,
//! and the orchestrator runs cycles over a waitlist of ready work until
//! nothing more can progress. State checkpoints to SQLite so a run can be
//! paused, inspected, resumed, or forked across process invocations.
//!
//! # Core Concepts
//!
//! - **Concepts & Inferences**: typed slots ([`concept`]) and the units of
//!   work that read and write them ([`inference`])
//! - **Cycles, not coroutines**: the orchestrator ([`orchestrator`]) drives
//!   discrete cycles; pause/cancel are cooperative signals, not thrown
//!   control flow
//! - **Sequences are a seam, not a feature**: [`sequence::Sequence`] is the
//!   trait an embedding application implements to give inferences actual
//!   behavior; this crate does not ship any production implementations
//! - **Checkpoints over byte-for-byte state**: [`checkpoint`] reconciles a
//!   saved blob against a live repo rather than demanding an exact replay
//!
//! # Modules
//!
//! - [`error`] - crate-wide error type
//! - [`config`] - configuration types and loading
//! - [`events`] - run event bus
//! - [`reference`] - labeled-axis tensor values
//! - [`concept`] - concept definitions and repository
//! - [`inference`] - inference definitions and repository
//! - [`waitlist`] - flow-index ordered ready queue
//! - [`blackboard`] - concept/item status tracking
//! - [`tracker`] - run-wide execution counters
//! - [`sequence`] - the `Sequence` trait
//! - [`orchestrator`] - the cycle loop and control operations
//! - [`checkpoint`] - SQLite-backed checkpoint store and reconciliation
//! - [`cli`] - command-line interface

pub mod blackboard;
pub mod checkpoint;
pub mod cli;
pub mod concept;
pub mod config;
pub mod error;
pub mod events;
pub mod inference;
pub mod orchestrator;
pub mod reference;
pub mod sequence;
pub mod tracker;
pub mod waitlist;

pub use blackboard::{Blackboard, CompletionDetail, ConceptStatus, ItemStatus};
pub use checkpoint::{
    BlackboardBlob, CheckpointBlob, CheckpointManager, CheckpointRow, CheckpointStore, ExecutionRow,
    ReconciliationMode, RunMetadataRow, SignatureBlob, TrackerBlob,
};
pub use concept::{ConceptEntry, ConceptRepo};
pub use config::{Config, RunConfig, StorageConfig};
pub use error::{OrchestratorError, OrchestratorResult};
pub use events::{EventBus, EventEmitter, OrchestratorEvent, create_event_bus};
pub use inference::{InferenceEntry, InferenceRepo};
pub use orchestrator::{ControlSignal, Orchestrator, RunControl, RunControlWatcher, RunOutcome};
pub use reference::{Reference, Value};
pub use sequence::{Sequence, SequenceInput, SequenceOutcome};
pub use tracker::{ExecutionRecord, ProcessTracker};
pub use waitlist::{Waitlist, WaitlistItem};
