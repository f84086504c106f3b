//! Configuration types and loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level orchestrator configuration, loaded from a YAML file with
/// environment/CLI override on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging level (TRACE, DEBUG, INFO, WARN, ERROR). CLI `--log-level`
    /// always wins over this value.
    pub log_level: Option<String>,

    pub storage: StorageConfig,
    pub run: RunConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            storage: StorageConfig::default(),
            run: RunConfig::default(),
        }
    }
}

/// Where repository files and the checkpoint database live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory containing `concepts.json` and `inferences.json`.
    pub repo_dir: PathBuf,
    /// Path to the checkpoint SQLite database.
    pub checkpoint_db: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            checkpoint_db: PathBuf::from("orchestrator.db"),
        }
    }
}

/// Orchestrator run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Threaded into every `Reference` operation a sequence performs
    /// (`cross_product`, `tensor_read`/`tensor_write`, `filter`): when
    /// true, a failing operation raises; when false, it returns a
    /// skip-marked reference instead.
    pub dev_mode: bool,
    /// Hard cap on cycles before the run is aborted as deadlocked/runaway.
    /// `None` means unbounded.
    pub cycle_cap: Option<u64>,
    /// Save a checkpoint every N cycles, in addition to explicit saves.
    pub checkpoint_every_cycles: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            cycle_cap: Some(100_000),
            checkpoint_every_cycles: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to the default
    /// user config location, falling back to defaults if neither exists.
    pub fn load(path: Option<&PathBuf>) -> eyre::Result<Self> {
        debug!(?path, "Config::load: called");
        let resolved = Self::resolve_path(path);

        let Some(resolved) = resolved else {
            debug!("Config::load: no config file found, using defaults");
            return Ok(Self::default());
        };

        debug!(?resolved, "Config::load: reading config file");
        let contents = fs::read_to_string(&resolved)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Peek at just the `log_level` field without fully validating the
    /// rest of the file, so logging can be set up before `load` runs.
    pub fn load_log_level(path: Option<&PathBuf>) -> Option<String> {
        debug!(?path, "Config::load_log_level: called");
        let resolved = Self::resolve_path(path)?;
        let contents = fs::read_to_string(&resolved).ok()?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents).ok()?;
        value.get("log_level")?.as_str().map(|s| s.to_string())
    }

    fn resolve_path(path: Option<&PathBuf>) -> Option<PathBuf> {
        if let Some(path) = path {
            return Some(path.clone());
        }
        let default_path = dirs::config_dir()?.join("normcode-orchestrator").join("config.yml");
        if default_path.exists() { Some(default_path) } else { None }
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
