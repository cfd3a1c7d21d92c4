use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{
    dialog_config::DialogConfig,
    logging_config::LoggingConfig,
    paths::{APP_NAME, ProjectPaths},
    scheduler_config::SchedulerConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to determine config directory")]
    NoConfigDir,
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("IO error reading config: {0}")]
    IoError(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KestrelConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub dialog: DialogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KestrelConfig {
    pub fn config_path() -> Result<PathBuf, ConfigLoadError> {
        ProjectPaths::new(APP_NAME)
            .map(|paths| paths.config_file())
            .ok_or(ConfigLoadError::NoConfigDir)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let mut config: KestrelConfig =
            toml::from_str(&content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        if config.scheduler.min_heartbeat_ms == 0 {
            warn!("scheduler.min_heartbeat_ms must be at least 1, using 1");
            config.scheduler.min_heartbeat_ms = 1;
        }
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigLoadError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigLoadError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        }

        let content =
            toml::to_string_pretty(&self).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}
