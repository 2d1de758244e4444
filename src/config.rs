use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::{TuneError, TuneResult};
use tracing::{Level, warn};

/// Application settings read from `config.toml`. These configure the tool
/// itself; tunable preferences live in the preference blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `preferences.json`, defaults to the user config dir
    pub storage_dir: Option<PathBuf>,
    pub log_level: String,
    /// Upper bound for a one-shot `status` poll
    pub poll_timeout_ms: u64,
    /// Block device whose I/O scheduler is reported
    pub block_device: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            log_level: "warn".to_string(),
            poll_timeout_ms: 2000,
            block_device: "mmcblk0".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => warn!(path = %path.display(), "Failed to parse config: {e}"),
                },
                Err(e) => warn!(path = %path.display(), "Failed to read config: {e}"),
            }
        }
        Self::default()
    }

    /// Write as pretty TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> TuneResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TuneError::ConfigError(format!("{}: {e}", parent.display())))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TuneError::ConfigError(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| TuneError::ConfigError(format!("{}: {e}", path.display())))
    }

    /// Parsed log level, `WARN` when unrecognised
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::WARN)
    }

    pub fn config_path() -> PathBuf {
        if let Some(config_dir) = directories::ProjectDirs::from("org", "tunectl", "tunectl") {
            config_dir.config_dir().join("config.toml")
        } else {
            PathBuf::from("tunectl_config.toml")
        }
    }
}
