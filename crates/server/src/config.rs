//! Server configuration.
//!
//! Every field has a default, so the server starts with no config file at
//! all. A YAML file (path from `--config` or the `SIEM_CONFIG` env var)
//! overrides any subset of fields; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use siem_engine::WorkingHoursPolicy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file invalid: {0}")]
    Parse(#[from] serde_yaml::Error),
}

fn default_bind_addr() -> String {
    "0.0.0.0:8084".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("siem.db")
}

fn default_collector_base_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_analysis_interval_secs() -> u64 {
    900
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiemConfig {
    /// Listen address for the HTTP API.
    pub bind_addr: String,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Base URL of the external event collector.
    pub collector_base_url: String,
    /// Per-request timeout for collector calls.
    pub request_timeout_secs: u64,
    /// Seconds between analysis job ticks.
    pub analysis_interval_secs: u64,
    pub working_hours: WorkingHoursPolicy,
}

impl Default for SiemConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            collector_base_url: default_collector_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            analysis_interval_secs: default_analysis_interval_secs(),
            working_hours: WorkingHoursPolicy::default(),
        }
    }
}

impl SiemConfig {
    /// Parses a YAML config file. Absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Resolves the config source: an explicit `--config` path wins, then
    /// the `SIEM_CONFIG` env var, then built-in defaults.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(|| std::env::var("SIEM_CONFIG").ok().map(PathBuf::from));
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_secs(self.analysis_interval_secs)
    }
}
