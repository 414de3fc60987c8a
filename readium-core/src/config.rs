use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::recent::MAX_RECENT_FILES;

pub const CONFIG_FILE_NAME: &str = "readium.toml";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "readium", "readium")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Undo entries kept per document.
    pub history_limit: usize,
    pub recent_files_limit: usize,
    /// Persist after every dispatched command.
    pub autosave: bool,
    /// Overrides the platform data directory for the persisted session.
    pub state_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            recent_files_limit: MAX_RECENT_FILES,
            autosave: true,
            state_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("failed to parse session config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml(&source).with_context(|| format!("invalid config file {:?}", path))
    }

    /// Loads `readium.toml` from the platform config directory.
    pub fn load_default() -> Result<Self> {
        match project_dirs() {
            Some(dirs) => Self::load(&dirs.config_dir().join(CONFIG_FILE_NAME)),
            None => Ok(Self::default()),
        }
    }

    pub fn state_dir(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_local_dir().join("state")))
    }
}
