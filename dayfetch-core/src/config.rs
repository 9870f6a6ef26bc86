//! TOML configuration, loaded once at process start.
//!
//! ```toml
//! [anchor]
//! id = 5600
//! date = "2024-01-02"
//! earliest_date = "2021-01-04"
//!
//! [archive]
//! base_url = "https://archive.example.com/historical"
//! ```

use crate::domain::{ReferenceAnchor, ResourceId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Artifacts published for every business day, in download order.
pub const DEFAULT_ARTIFACTS: [&str; 4] = [
    "WEBPXTICK_DT.zip",
    "TickData_structure.dat",
    "TC.txt",
    "TC_structure.dat",
];

/// Artifact whose response metadata carries the dataset date.
pub const DEFAULT_PROBE_ARTIFACT: &str = "TC.txt";

pub const DEFAULT_MAX_ITERATIONS: u32 = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub anchor: AnchorConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnchorConfig {
    pub id: u64,
    pub date: NaiveDate,
    pub earliest_date: NaiveDate,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveConfig {
    pub base_url: String,
    #[serde(default = "default_probe_artifact")]
    pub probe_artifact: String,
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_probe_artifact() -> String {
    DEFAULT_PROBE_ARTIFACT.to_string()
}

fn default_artifacts() -> Vec<String> {
    DEFAULT_ARTIFACTS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl AppConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.anchor.earliest_date > self.anchor.date {
            return Err(ConfigError::Invalid(format!(
                "anchor.earliest_date {} is after anchor.date {}",
                self.anchor.earliest_date, self.anchor.date
            )));
        }
        if self.anchor.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "anchor.max_iterations must be at least 1".into(),
            ));
        }
        if self.archive.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("archive.base_url is empty".into()));
        }
        if self.archive.artifacts.is_empty() {
            return Err(ConfigError::Invalid("archive.artifacts is empty".into()));
        }
        if self.archive.probe_artifact.trim().is_empty() {
            return Err(ConfigError::Invalid("archive.probe_artifact is empty".into()));
        }
        Ok(())
    }

    pub fn reference_anchor(&self) -> ReferenceAnchor {
        ReferenceAnchor {
            anchor_id: ResourceId(self.anchor.id),
            anchor_date: self.anchor.date,
            earliest_date: self.anchor.earliest_date,
        }
    }
}

impl ArchiveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
