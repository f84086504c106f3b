//! CLI command definitions and subcommands.
//!
//! Every invocation is a single process run: it loads the repo files (and,
//! for checkpoint-based commands, a saved blob), drives zero or more
//! cycles, and persists whatever state changed before exiting. There is no
//! resident daemon to pause/resume against — crossing process boundaries
//! is what checkpoints are for.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// normcode-orchestrator - dependency-driven inference orchestrator
#[derive(Parser)]
#[command(
    name = "normcode-orchestrator",
    about = "Dependency-driven inference orchestrator for NormCode flows",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true, help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands, one per public control operation.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a new run from a concept/inference repo directory and drive
    /// it to completion (or until it needs user interaction).
    Start {
        /// Directory containing `concepts.json` and `inferences.json`.
        #[arg(long)]
        repo_dir: PathBuf,
        /// Run id to record this run's history under. Generated if omitted.
        #[arg(long)]
        run_id: Option<String>,
        /// Override the configured cycle cap for this run.
        #[arg(long)]
        max_cycles: Option<u64>,
    },

    /// Run exactly one cycle of a resumed run, then save a checkpoint and
    /// exit — the single-process analog of "step".
    Step {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
    },

    /// Drive a resumed run until `flow_index` completes, then checkpoint
    /// and exit.
    RunTo {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
        flow_index: String,
    },

    /// Reset `flow_index` and its dataflow descendants to pending, then
    /// resume the run.
    RerunFrom {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
        flow_index: String,
    },

    /// Overwrite a concept's reference directly, optionally resetting its
    /// dependents to pending so they re-execute against the new value.
    OverrideValue {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
        concept: String,
        /// New value as a JSON scalar or nested list, e.g. `42` or `[1,2]`.
        value: String,
        #[arg(long)]
        rerun_dependents: bool,
    },

    /// Rebuild a run from its repo files with the same run config
    /// (discarding in-progress state, keeping checkpoint history).
    Restart {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
    },

    /// Mark a run paused. A paused run's `step`/`run-to`/`resume` refuse to
    /// drive cycles until `resume` clears the flag — the persisted
    /// analog of the in-process `RunControl` signal, since there is no
    /// resident process to send it to across invocations.
    Pause {
        #[arg(long)]
        run_id: String,
    },

    /// Clear a run's paused flag and drive it for one cycle, the same as
    /// `step`.
    Resume {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
    },

    /// Mark a run stopped. A stopped run's flag is terminal: subsequent
    /// `step`/`run-to`/`resume` refuse to drive it; only `restart` or
    /// `checkpoint fork-from-checkpoint` can bring its lineage forward.
    Stop {
        #[arg(long)]
        run_id: String,
    },

    /// Record a flow-index breakpoint: a `step`/`run-to` that would
    /// execute this item instead halts just before it and checkpoints.
    SetBreakpoint {
        #[arg(long)]
        run_id: String,
        flow_index: String,
    },

    /// Remove a previously recorded breakpoint.
    ClearBreakpoint {
        #[arg(long)]
        run_id: String,
        flow_index: String,
    },

    /// Repoint an inference's function concept, e.g. after correcting a
    /// mis-specified step, then reset the item to pending so it
    /// re-executes against the new function.
    ModifyFunction {
        #[arg(long)]
        run_id: String,
        #[arg(long)]
        repo_dir: PathBuf,
        flow_index: String,
        function_concept: String,
    },

    /// Checkpoint store inspection and recovery.
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CheckpointCommand {
    /// List every run with saved metadata.
    ListRuns,

    /// List every checkpoint saved for a run.
    ListCheckpoints { run_id: String },

    /// Resume a run from its latest (or a specific) checkpoint.
    ResumeFromCheckpoint {
        run_id: String,
        repo_dir: PathBuf,
        #[arg(long)]
        cycle: Option<u64>,
        #[arg(long)]
        inference_count: Option<u64>,
        #[arg(long, value_enum, default_value = "patch")]
        mode: ReconciliationModeArg,
    },

    /// Resume a checkpoint under a new run id, leaving the original run's
    /// history untouched.
    ForkFromCheckpoint {
        run_id: String,
        new_run_id: String,
        repo_dir: PathBuf,
        #[arg(long)]
        cycle: Option<u64>,
        #[arg(long)]
        inference_count: Option<u64>,
        #[arg(long, value_enum, default_value = "patch")]
        mode: ReconciliationModeArg,
    },

    /// Delete a run's metadata, checkpoints, and execution history.
    DeleteRun { run_id: String },
}

/// CLI-facing mirror of [`crate::checkpoint::ReconciliationMode`] — kept
/// distinct so clap's `ValueEnum` derive doesn't need to live on the core
/// orchestrator type.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ReconciliationModeArg {
    Overwrite,
    Patch,
    FillGaps,
}

impl From<ReconciliationModeArg> for crate::checkpoint::ReconciliationMode {
    fn from(value: ReconciliationModeArg) -> Self {
        match value {
            ReconciliationModeArg::Overwrite => Self::Overwrite,
            ReconciliationModeArg::Patch => Self::Patch,
            ReconciliationModeArg::FillGaps => Self::FillGaps,
        }
    }
}

/// Output format for status/listing commands.
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown format: {s}. use: text or json")),
        }
    }
}

/// Parse a CLI value string (`42`, `true`, `"x"`, `[1,2]`) into a
/// [`crate::reference::Value`] for `override_value`.
pub fn parse_value_arg(raw: &str) -> Result<crate::reference::Value, String> {
    debug!(raw, "parse_value_arg: called");
    let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| format!("invalid value '{raw}': {e}"))?;
    crate::reference::Value::from_untagged_json(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Value;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["normcode-orchestrator"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_start() {
        let cli = Cli::parse_from(["normcode-orchestrator", "start", "--repo-dir", "./repo"]);
        assert!(matches!(cli.command, Some(Command::Start { .. })));
    }

    #[test]
    fn test_cli_parse_checkpoint_list_runs() {
        let cli = Cli::parse_from(["normcode-orchestrator", "checkpoint", "list-runs"]);
        assert!(matches!(
            cli.command,
            Some(Command::Checkpoint {
                command: CheckpointCommand::ListRuns
            })
        ));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn parse_value_arg_scalars_and_lists() {
        assert_eq!(parse_value_arg("42").unwrap(), Value::Int(42));
        assert_eq!(parse_value_arg("\"hi\"").unwrap(), Value::Text("hi".to_string()));
        assert_eq!(parse_value_arg("[1,2]").unwrap(), Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn parse_value_arg_rejects_objects() {
        assert!(parse_value_arg("{\"a\":1}").is_err());
    }
}
