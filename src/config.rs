//! Runtime configuration.
//!
//! Loaded from a JSON file; every field has a default so an absent file or a
//! partial one both work.

use crate::drive::PositionPolicy;
use crate::error::{MtarError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DEVICE: &str = "/dev/nst0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: String,
    pub mt_tool: String,
    pub tar_tool: String,
    pub status_timeout_secs: u64,
    /// `None` lets seeks run as long as the drive needs
    pub movement_timeout_secs: Option<u64>,
    pub positioning: PositionPolicy,
    pub lock_dir: Option<PathBuf>,
    pub pushover: Option<PushoverConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    pub token: String,
    pub user: String,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            mt_tool: "mt".to_string(),
            tar_tool: "tar".to_string(),
            status_timeout_secs: 5,
            movement_timeout_secs: None,
            positioning: PositionPolicy::Step,
            lock_dir: None,
            pushover: None,
        }
    }
}

impl Config {
    /// Load `path` when given, else the per-user default location when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MtarError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            MtarError::configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn movement_timeout(&self) -> Option<Duration> {
        self.movement_timeout_secs.map(Duration::from_secs)
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rustmtar").join("config.json"))
}
