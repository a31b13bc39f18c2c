use crate::error::{PenflowError, Result};
use crate::store::StorageError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
pub const DEFAULT_DATABASE_NAME: &str = "penflow";
const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 1000;

/// Settings for the library store, kept in `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PenflowConfig {
    /// Names the database document (`<data dir>/<name>.json`).
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Where database documents live. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Minimum time between background flushes. `0` writes through.
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

fn default_autosave_interval_ms() -> u64 {
    DEFAULT_AUTOSAVE_INTERVAL_MS
}

impl Default for PenflowConfig {
    fn default() -> Self {
        Self {
            database_name: default_database_name(),
            data_dir: None,
            autosave_interval_ms: DEFAULT_AUTOSAVE_INTERVAL_MS,
        }
    }
}

impl PenflowConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(&config_path).map_err(|e| PenflowError::config(&config_path, e))?;
        let config: PenflowConfig =
            serde_json::from_str(&content).map_err(|e| PenflowError::config(&config_path, e))?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(|e| PenflowError::config(&config_path, e))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| PenflowError::config(&config_path, e))?;
        fs::write(&config_path, content).map_err(|e| PenflowError::config(&config_path, e))?;
        Ok(())
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    /// The configured data directory, or the platform default.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                PenflowError::config(
                    "<data dir>",
                    StorageError::Unavailable("could not determine data directory".to_string()),
                )
            })
    }

    /// The platform config directory, where `config.json` is looked up.
    pub fn default_config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "penflow", "penflow")
}
