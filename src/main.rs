//! Binary entry point: logging setup and CLI command dispatch.
//!
//! Every subcommand is a single process run: load the repo files (and,
//! where relevant, a saved checkpoint), drive zero or more cycles, persist
//! whatever changed, and exit. There is no resident daemon — `pause`,
//! `stop`, and breakpoints are flags persisted in the checkpoint store's
//! `run_metadata` row rather than signals sent to a running process.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result, bail, eyre};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use norm_orchestrator::blackboard::{ConceptStatus, ItemStatus};
use norm_orchestrator::checkpoint::{CheckpointManager, CheckpointStore, ReconciliationMode};
use norm_orchestrator::cli::{CheckpointCommand, Cli, Command, parse_value_arg};
use norm_orchestrator::concept::ConceptRepo;
use norm_orchestrator::config::Config;
use norm_orchestrator::events::create_event_bus;
use norm_orchestrator::inference::InferenceRepo;
use norm_orchestrator::orchestrator::{Orchestrator, RunControl, RunOutcome};
use norm_orchestrator::reference::Reference;
use norm_orchestrator::sequence::Sequence;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<String>) -> Result<()> {
    let level = cli_log_level
        .map(|s| s.to_string())
        .or(config_log_level)
        .unwrap_or_else(|| "info".to_string());

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("normcode-orchestrator")
        .join("logs");
    std::fs::create_dir_all(&log_dir).context("creating log directory")?;
    let log_path = log_dir.join("orchestrator.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let filter = tracing_subscriber::EnvFilter::try_new(&level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || file.try_clone().expect("clone log file handle"))
        .with_ansi(false)
        .init();

    Ok(())
}

/// Persisted control state for one run, stored verbatim as
/// `run_metadata.json_blob`. Distinct from a `CheckpointBlob`: this is
/// lifecycle metadata about the run, not its orchestration state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RunMetadata {
    #[serde(default)]
    repo_dir: Option<PathBuf>,
    #[serde(default)]
    max_cycles: Option<u64>,
    #[serde(default)]
    paused: bool,
    #[serde(default)]
    stopped: bool,
    #[serde(default)]
    breakpoints: HashSet<String>,
}

fn load_metadata(store: &CheckpointStore, run_id: &str) -> Result<RunMetadata> {
    match store.load_run_metadata(run_id)? {
        Some(row) => Ok(serde_json::from_str(&row.json_blob).unwrap_or_default()),
        None => Ok(RunMetadata::default()),
    }
}

fn save_metadata(store: &CheckpointStore, run_id: &str, metadata: &RunMetadata) -> Result<()> {
    let json = serde_json::to_string(metadata)?;
    store.save_run_metadata(run_id, &json)?;
    Ok(())
}

fn load_repos(repo_dir: &Path) -> Result<(ConceptRepo, InferenceRepo)> {
    let concepts_json = std::fs::read_to_string(repo_dir.join("concepts.json"))
        .with_context(|| format!("reading {}", repo_dir.join("concepts.json").display()))?;
    let inferences_json = std::fs::read_to_string(repo_dir.join("inferences.json"))
        .with_context(|| format!("reading {}", repo_dir.join("inferences.json").display()))?;
    let concepts = ConceptRepo::from_json_str(&concepts_json)?;
    let inferences = InferenceRepo::from_json_str(&inferences_json, &concepts)?;
    Ok((concepts, inferences))
}

fn open_store(config: &Config) -> Result<Arc<CheckpointStore>> {
    if let Some(parent) = config.storage.checkpoint_db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("creating checkpoint database directory")?;
        }
    }
    Ok(Arc::new(CheckpointStore::open(&config.storage.checkpoint_db)?))
}

fn no_sequences() -> HashMap<String, Arc<dyn Sequence>> {
    HashMap::new()
}

fn checkpoint_now(manager: &CheckpointManager, orchestrator: &Orchestrator) -> Result<()> {
    manager.save(
        orchestrator.run_id(),
        orchestrator.tracker().cycle_count,
        orchestrator.tracker().total_executions,
        orchestrator.concepts(),
        orchestrator.inferences(),
        orchestrator.blackboard(),
        orchestrator.tracker(),
        orchestrator.workspace(),
    )?;
    Ok(())
}

/// A breakpointed item is one in `breakpoints` the next cycle would
/// actually pick up and execute. Checked before every cycle so `step` and
/// `run-to` halt before running it rather than after.
fn hit_breakpoint(orchestrator: &Orchestrator, breakpoints: &HashSet<String>) -> Option<String> {
    orchestrator
        .waitlist()
        .items()
        .iter()
        .find(|item| breakpoints.contains(item.flow_index()) && orchestrator.is_item_ready(item.id()))
        .map(|item| item.flow_index().to_string())
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed { final_concepts } => {
            println!("completed: final concepts = {}", final_concepts.join(", "));
        }
        RunOutcome::Deadlocked { waiting } => {
            println!("deadlocked: {waiting} item(s) waiting, none ready");
        }
        RunOutcome::CycleBudgetExceeded => {
            println!("cycle budget exceeded");
        }
        RunOutcome::Cancelled => {
            println!("cancelled");
        }
        RunOutcome::NeedsUserInteraction { item_id, prompt } => {
            println!("needs user interaction: item {item_id} — {prompt}");
        }
    }
}

/// Reset `item_id`'s status and, unless `concept_name` is flagged
/// invariant, the status and reference of the concept it produces — so
/// the item re-executes and its stale output stops shadowing it.
fn reset_item_and_its_concept(orchestrator: &mut Orchestrator, item_id: &str, concept_name: &str) {
    let is_invariant = orchestrator.concepts().get(concept_name).map(|c| c.is_invariant).unwrap_or(false);
    orchestrator.blackboard_mut().reset_item(item_id);
    if !is_invariant {
        orchestrator.blackboard_mut().reset_concept(concept_name);
        let _ = orchestrator.concepts_mut().clear_reference(concept_name);
    }
}

/// Load a resumable orchestrator for `run_id` from its latest checkpoint,
/// reconciled against the live repo at `repo_dir`.
fn resume_orchestrator(config: &Config, store: &Arc<CheckpointStore>, run_id: &str, repo_dir: &Path, max_cycles: u64) -> Result<Orchestrator> {
    let (concepts, inferences) = load_repos(repo_dir)?;
    let manager = CheckpointManager::new(store.clone());
    let blob = manager
        .load(run_id, None, None)?
        .ok_or_else(|| eyre!("no checkpoint found for run '{run_id}' — use 'start' first"))?;
    let bus = create_event_bus();
    let mut orchestrator = Orchestrator::new(run_id.to_string(), concepts, inferences, no_sequences(), bus.emitter_for(run_id.to_string()), max_cycles);
    orchestrator.set_dev_mode(config.run.dev_mode);
    orchestrator.reconcile_checkpoint(&blob, ReconciliationMode::Patch, None);
    Ok(orchestrator)
}

/// Drive `orchestrator` up to `cycle_limit` additional cycles, halting
/// early on a breakpoint, completion, deadlock, or the cycle budget.
async fn drive_cycles(orchestrator: &mut Orchestrator, breakpoints: &HashSet<String>, cycle_limit: u64) -> Result<RunOutcome> {
    let target = orchestrator.tracker().cycle_count.saturating_add(cycle_limit);
    loop {
        if let Some(flow_index) = hit_breakpoint(orchestrator, breakpoints) {
            println!("breakpoint hit at flow index {flow_index}, halting before execution");
            return Ok(RunOutcome::Cancelled);
        }
        if orchestrator.tracker().cycle_count >= target {
            return Ok(RunOutcome::CycleBudgetExceeded);
        }
        orchestrator.set_max_cycles(orchestrator.tracker().cycle_count + 1);
        let (_control, watcher) = RunControl::new();
        match orchestrator.run(watcher).await? {
            RunOutcome::Completed { final_concepts } => return Ok(RunOutcome::Completed { final_concepts }),
            RunOutcome::Deadlocked { waiting } => return Ok(RunOutcome::Deadlocked { waiting }),
            RunOutcome::CycleBudgetExceeded => continue,
            RunOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
            RunOutcome::NeedsUserInteraction { item_id, prompt } => {
                return Ok(RunOutcome::NeedsUserInteraction { item_id, prompt });
            }
        }
    }
}

async fn cmd_start(config: &Config, repo_dir: PathBuf, run_id: Option<String>, max_cycles: Option<u64>) -> Result<()> {
    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    let max_cycles = max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let (concepts, inferences) = load_repos(&repo_dir)?;
    let store = open_store(config)?;

    save_metadata(
        &store,
        &run_id,
        &RunMetadata {
            repo_dir: Some(repo_dir),
            max_cycles: Some(max_cycles),
            ..Default::default()
        },
    )?;

    let bus = create_event_bus();
    let mut orchestrator = Orchestrator::new(run_id.clone(), concepts, inferences, no_sequences(), bus.emitter_for(run_id.clone()), max_cycles);
    orchestrator.set_dev_mode(config.run.dev_mode);
    let (_control, watcher) = RunControl::new();
    let outcome = orchestrator.run(watcher).await?;

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_step(config: &Config, run_id: String, repo_dir: PathBuf) -> Result<()> {
    let store = open_store(config)?;
    let metadata = load_metadata(&store, &run_id)?;
    if metadata.stopped {
        bail!("run '{run_id}' is stopped; restart or fork-from-checkpoint to continue its lineage");
    }
    if metadata.paused {
        bail!("run '{run_id}' is paused; use 'resume' to clear the pause flag and step");
    }

    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let mut orchestrator = resume_orchestrator(config, &store, &run_id, &repo_dir, max_cycles)?;
    let outcome = drive_cycles(&mut orchestrator, &metadata.breakpoints, 1).await?;

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_run_to(config: &Config, run_id: String, repo_dir: PathBuf, flow_index: String) -> Result<()> {
    let store = open_store(config)?;
    let metadata = load_metadata(&store, &run_id)?;
    if metadata.stopped {
        bail!("run '{run_id}' is stopped; restart or fork-from-checkpoint to continue its lineage");
    }
    if metadata.paused {
        bail!("run '{run_id}' is paused; use 'resume' to clear the pause flag first");
    }

    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let mut orchestrator = resume_orchestrator(config, &store, &run_id, &repo_dir, max_cycles)?;
    let target_id = orchestrator
        .waitlist()
        .get_by_flow_index(&flow_index)
        .map(|item| item.id().to_string())
        .ok_or_else(|| eyre!("no item with flow index '{flow_index}' in this repo"))?;

    let outcome = loop {
        if matches!(
            orchestrator.blackboard().item_status(&target_id),
            ItemStatus::Completed | ItemStatus::Failed
        ) {
            break RunOutcome::Completed {
                final_concepts: vec![flow_index.clone()],
            };
        }
        match drive_cycles(&mut orchestrator, &metadata.breakpoints, 1).await? {
            RunOutcome::CycleBudgetExceeded => continue,
            other => break other,
        }
    };

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_rerun_from(config: &Config, run_id: String, repo_dir: PathBuf, flow_index: String) -> Result<()> {
    let store = open_store(config)?;
    let metadata = load_metadata(&store, &run_id)?;
    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let mut orchestrator = resume_orchestrator(config, &store, &run_id, &repo_dir, max_cycles)?;

    let target = orchestrator
        .waitlist()
        .get_by_flow_index(&flow_index)
        .cloned()
        .ok_or_else(|| eyre!("no item with flow index '{flow_index}' in this repo"))?;
    let mut to_reset = vec![(target.id().to_string(), target.inference.concept_to_infer.clone())];
    to_reset.extend(
        orchestrator
            .waitlist()
            .get_supporting_items(&target)
            .into_iter()
            .map(|item| (item.id().to_string(), item.inference.concept_to_infer.clone())),
    );
    for (item_id, concept_name) in to_reset {
        reset_item_and_its_concept(&mut orchestrator, &item_id, &concept_name);
    }

    let outcome = drive_cycles(&mut orchestrator, &metadata.breakpoints, u64::MAX).await?;

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_override_value(config: &Config, run_id: String, repo_dir: PathBuf, concept: String, value: String, rerun_dependents: bool) -> Result<()> {
    let store = open_store(config)?;
    let metadata = load_metadata(&store, &run_id)?;
    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let mut orchestrator = resume_orchestrator(config, &store, &run_id, &repo_dir, max_cycles)?;

    let parsed = parse_value_arg(&value).map_err(|e| eyre!(e))?;
    let reference = Reference::from_nested(parsed, None)?;
    orchestrator.concepts_mut().set_reference(&concept, reference)?;
    orchestrator.blackboard_mut().set_concept_status(&concept, ConceptStatus::Complete);

    if rerun_dependents {
        let dependents: Vec<(String, String)> = orchestrator
            .waitlist()
            .items()
            .iter()
            .filter(|item| {
                item.inference.value_concepts.iter().any(|c| c == &concept)
                    || item.inference.context_concepts.iter().any(|c| c == &concept)
                    || item.inference.function_concept.as_deref() == Some(concept.as_str())
            })
            .map(|item| (item.id().to_string(), item.inference.concept_to_infer.clone()))
            .collect();
        for (item_id, concept_name) in dependents {
            reset_item_and_its_concept(&mut orchestrator, &item_id, &concept_name);
        }
    }

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    println!("overrode '{concept}', rerun_dependents={rerun_dependents}");
    Ok(())
}

async fn cmd_restart(config: &Config, run_id: String, repo_dir: PathBuf) -> Result<()> {
    let store = open_store(config)?;
    let metadata = load_metadata(&store, &run_id)?;
    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let (concepts, inferences) = load_repos(&repo_dir)?;

    let bus = create_event_bus();
    let mut orchestrator = Orchestrator::new(run_id.clone(), concepts, inferences, no_sequences(), bus.emitter_for(run_id.clone()), max_cycles);
    orchestrator.set_dev_mode(config.run.dev_mode);
    let (_control, watcher) = RunControl::new();
    let outcome = orchestrator.run(watcher).await?;

    save_metadata(
        &store,
        &run_id,
        &RunMetadata {
            repo_dir: Some(repo_dir),
            max_cycles: Some(max_cycles),
            ..Default::default()
        },
    )?;
    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_pause(config: &Config, run_id: String) -> Result<()> {
    let store = open_store(config)?;
    let mut metadata = load_metadata(&store, &run_id)?;
    if metadata.stopped {
        bail!("run '{run_id}' is already stopped");
    }
    metadata.paused = true;
    save_metadata(&store, &run_id, &metadata)?;
    println!("paused '{run_id}'");
    Ok(())
}

async fn cmd_resume(config: &Config, run_id: String, repo_dir: PathBuf) -> Result<()> {
    let store = open_store(config)?;
    let mut metadata = load_metadata(&store, &run_id)?;
    if metadata.stopped {
        bail!("run '{run_id}' is stopped; restart or fork-from-checkpoint to continue its lineage");
    }
    metadata.paused = false;
    save_metadata(&store, &run_id, &metadata)?;

    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let mut orchestrator = resume_orchestrator(config, &store, &run_id, &repo_dir, max_cycles)?;
    let outcome = drive_cycles(&mut orchestrator, &metadata.breakpoints, 1).await?;

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_stop(config: &Config, run_id: String) -> Result<()> {
    let store = open_store(config)?;
    let mut metadata = load_metadata(&store, &run_id)?;
    metadata.stopped = true;
    metadata.paused = false;
    save_metadata(&store, &run_id, &metadata)?;
    println!("stopped '{run_id}'");
    Ok(())
}

fn cmd_set_breakpoint(config: &Config, run_id: String, flow_index: String) -> Result<()> {
    let store = open_store(config)?;
    let mut metadata = load_metadata(&store, &run_id)?;
    metadata.breakpoints.insert(flow_index.clone());
    save_metadata(&store, &run_id, &metadata)?;
    println!("set breakpoint at '{flow_index}' for '{run_id}'");
    Ok(())
}

fn cmd_clear_breakpoint(config: &Config, run_id: String, flow_index: String) -> Result<()> {
    let store = open_store(config)?;
    let mut metadata = load_metadata(&store, &run_id)?;
    metadata.breakpoints.remove(&flow_index);
    save_metadata(&store, &run_id, &metadata)?;
    println!("cleared breakpoint at '{flow_index}' for '{run_id}'");
    Ok(())
}

async fn cmd_modify_function(config: &Config, run_id: String, repo_dir: PathBuf, flow_index: String, function_concept: String) -> Result<()> {
    let store = open_store(config)?;
    let metadata = load_metadata(&store, &run_id)?;
    let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
    let mut orchestrator = resume_orchestrator(config, &store, &run_id, &repo_dir, max_cycles)?;

    let (item_id, concept_name) = {
        let item = orchestrator
            .waitlist()
            .get_by_flow_index(&flow_index)
            .ok_or_else(|| eyre!("no item with flow index '{flow_index}' in this repo"))?;
        (item.id().to_string(), item.inference.concept_to_infer.clone())
    };
    {
        let entry = orchestrator
            .inferences_mut()
            .get_mut_by_flow_index(&flow_index)
            .ok_or_else(|| eyre!("no inference with flow index '{flow_index}'"))?;
        entry.function_concept = Some(function_concept.clone());
    }
    reset_item_and_its_concept(&mut orchestrator, &item_id, &concept_name);

    let manager = CheckpointManager::new(store);
    checkpoint_now(&manager, &orchestrator)?;
    println!("repointed '{flow_index}' to function concept '{function_concept}'");
    Ok(())
}

async fn cmd_checkpoint(config: &Config, command: CheckpointCommand) -> Result<()> {
    let store = open_store(config)?;
    match command {
        CheckpointCommand::ListRuns => {
            for row in store.list_runs()? {
                println!("{}\tupdated_at={}", row.run_id, row.updated_at);
            }
        }
        CheckpointCommand::ListCheckpoints { run_id } => {
            for row in store.list_checkpoints(&run_id)? {
                println!("cycle={} inference_count={} timestamp={}", row.cycle, row.inference_count, row.timestamp);
            }
        }
        CheckpointCommand::ResumeFromCheckpoint {
            run_id,
            repo_dir,
            cycle,
            inference_count,
            mode,
        } => {
            let (concepts, inferences) = load_repos(&repo_dir)?;
            let manager = CheckpointManager::new(store.clone());
            let blob = manager
                .load(&run_id, cycle, inference_count)?
                .ok_or_else(|| eyre!("no checkpoint found for run '{run_id}'"))?;
            let bus = create_event_bus();
            let metadata = load_metadata(&store, &run_id)?;
            let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
            let mut orchestrator = Orchestrator::new(run_id.clone(), concepts, inferences, no_sequences(), bus.emitter_for(run_id.clone()), max_cycles);
            orchestrator.set_dev_mode(config.run.dev_mode);
            orchestrator.reconcile_checkpoint(&blob, mode.into(), None);
            let (_control, watcher) = RunControl::new();
            let outcome = orchestrator.run(watcher).await?;
            checkpoint_now(&manager, &orchestrator)?;
            print_outcome(&outcome);
        }
        CheckpointCommand::ForkFromCheckpoint {
            run_id,
            new_run_id,
            repo_dir,
            cycle,
            inference_count,
            mode,
        } => {
            let (concepts, inferences) = load_repos(&repo_dir)?;
            let manager = CheckpointManager::new(store.clone());
            let blob = manager
                .load(&run_id, cycle, inference_count)?
                .ok_or_else(|| eyre!("no checkpoint found for run '{run_id}'"))?;
            let bus = create_event_bus();
            let metadata = load_metadata(&store, &run_id)?;
            let max_cycles = metadata.max_cycles.or(config.run.cycle_cap).unwrap_or(u64::MAX);
            let mut orchestrator = Orchestrator::new(
                new_run_id.clone(),
                concepts,
                inferences,
                no_sequences(),
                bus.emitter_for(new_run_id.clone()),
                max_cycles,
            );
            orchestrator.set_dev_mode(config.run.dev_mode);
            orchestrator.reconcile_checkpoint(&blob, mode.into(), Some(new_run_id.clone()));
            let (_control, watcher) = RunControl::new();
            let outcome = orchestrator.run(watcher).await?;
            checkpoint_now(&manager, &orchestrator)?;
            print_outcome(&outcome);
        }
        CheckpointCommand::DeleteRun { run_id } => {
            store.delete_run(&run_id)?;
            println!("deleted run '{run_id}'");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("loading config")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.clone())?;

    let Some(command) = cli.command else {
        println!("no subcommand given; run with --help for usage");
        return Ok(());
    };
    info!(?command, "dispatching command");

    match command {
        Command::Start { repo_dir, run_id, max_cycles } => cmd_start(&config, repo_dir, run_id, max_cycles).await,
        Command::Step { run_id, repo_dir } => cmd_step(&config, run_id, repo_dir).await,
        Command::RunTo { run_id, repo_dir, flow_index } => cmd_run_to(&config, run_id, repo_dir, flow_index).await,
        Command::RerunFrom { run_id, repo_dir, flow_index } => cmd_rerun_from(&config, run_id, repo_dir, flow_index).await,
        Command::OverrideValue {
            run_id,
            repo_dir,
            concept,
            value,
            rerun_dependents,
        } => cmd_override_value(&config, run_id, repo_dir, concept, value, rerun_dependents).await,
        Command::Restart { run_id, repo_dir } => cmd_restart(&config, run_id, repo_dir).await,
        Command::Pause { run_id } => {
            warn!(run_id, "pausing run");
            cmd_pause(&config, run_id)
        }
        Command::Resume { run_id, repo_dir } => cmd_resume(&config, run_id, repo_dir).await,
        Command::Stop { run_id } => cmd_stop(&config, run_id),
        Command::SetBreakpoint { run_id, flow_index } => cmd_set_breakpoint(&config, run_id, flow_index),
        Command::ClearBreakpoint { run_id, flow_index } => cmd_clear_breakpoint(&config, run_id, flow_index),
        Command::ModifyFunction {
            run_id,
            repo_dir,
            flow_index,
            function_concept,
        } => cmd_modify_function(&config, run_id, repo_dir, flow_index, function_concept).await,
        Command::Checkpoint { command } => cmd_checkpoint(&config, command).await,
    }
}
