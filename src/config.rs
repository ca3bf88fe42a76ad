use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

pub const DEFAULT_TICK_RATE_MS: u64 = 250;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Database file; the state directory is used when unset
    pub store_path: Option<PathBuf>,
    /// How often the session screen redraws the elapsed clock
    pub tick_rate_ms: u64,
    /// `tracing` filter directive, e.g. `info` or `gymtrack=debug`
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            tick_rate_ms: DEFAULT_TICK_RATE_MS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("gymtrack_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "ignoring invalid config file");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
