//! Checkpoint persistence: a SQLite-backed store (C9) plus the
//! serialize/reconcile logic that installs saved state into a live
//! orchestrator (C10).

mod blob;
mod manager;
mod store;

pub use blob::{BlackboardBlob, CheckpointBlob, SignatureBlob, TrackerBlob};
pub use manager::{CheckpointManager, ReconciliationMode};
pub use store::{CheckpointRow, CheckpointStore, ExecutionRow, RunMetadataRow};
