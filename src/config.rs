//! Server configuration (spec §6 "Startup/CLI", ambient config layer).
//! Loaded from an optional TOML file and overridden by CLI flags, the way
//! the teacher's `ActorConfig` layers a `toml` file under CLI-supplied
//! values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database_path: PathBuf,
    pub port: u16,
    /// Wall-clock seconds between automatic checkpoints; 0 disables
    /// periodic checkpointing (an explicit `dump_database()`/SIGUSR still
    /// works either way).
    pub checkpoint_interval_secs: u64,
    pub log_level: String,
    /// Output bytes queued per connection before `notify()` starts
    /// dropping and logging instead of growing without bound (spec §7).
    pub max_queued_output: usize,
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            database_path: PathBuf::from("minimal.db"),
            port: 7777,
            checkpoint_interval_secs: 300,
            log_level: "info".to_string(),
            max_queued_output: 65536,
            connect_timeout_secs: 300,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
