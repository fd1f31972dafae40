//! Pipeline settings stored as TOML.
//!
//! Every section and field carries a serde default, so a partial file (or no
//! file at all) yields a complete configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::gold::{DEFAULT_TOP_K, TierThresholds};
use crate::ml::{DEFAULT_THRESHOLD, ForestOptions};

/// Default filename of the pipeline configuration under the app root.
pub const CONFIG_FILE_NAME: &str = "churnsight.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub forest: ForestOptions,
    #[serde(default)]
    pub explain: ExplainSettings,
    #[serde(default)]
    pub gold: GoldSettings,
    #[serde(default)]
    pub split: SplitSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Background set used as the attribution reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainSettings {
    /// Upper bound on background rows sampled from the training vectors.
    #[serde(default = "default_background_size")]
    pub background_size: usize,
    #[serde(default = "default_background_seed")]
    pub seed: u64,
}

impl Default for ExplainSettings {
    fn default() -> Self {
        Self {
            background_size: default_background_size(),
            seed: default_background_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// `|contribution|` at or above which a driver is at least medium.
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// `|contribution|` at or above which a driver is high.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Probability at or above which a customer is flagged as churning.
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

impl Default for GoldSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
            decision_threshold: default_decision_threshold(),
        }
    }
}

impl GoldSettings {
    pub fn tiers(&self) -> TierThresholds {
        TierThresholds {
            medium: self.medium_threshold,
            high: self.high_threshold,
        }
    }
}

/// Deterministic holdout split used when evaluating a freshly trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSettings {
    #[serde(default = "default_split_seed")]
    pub seed: String,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            seed: default_split_seed(),
            test_fraction: default_test_fraction(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write a per-run log file.
    #[serde(default = "default_true")]
    pub file: bool,
    /// Log directory; the app logs directory when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: true,
            dir: None,
            max_files: default_max_log_files(),
        }
    }
}

fn default_background_size() -> usize {
    100
}

fn default_background_seed() -> u64 {
    42
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_medium_threshold() -> f64 {
    TierThresholds::default().medium
}

fn default_high_threshold() -> f64 {
    TierThresholds::default().high
}

fn default_decision_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_split_seed() -> String {
    "churnsight".to_string()
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_log_files() -> usize {
    10
}

/// Errors that may occur while loading or saving pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Invalid config at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error(transparent)]
    AppDirs(#[from] app_dirs::AppDirError),
}

impl PipelineConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.forest.validate()?;
        if self.explain.background_size == 0 {
            return Err("explain.background_size must be at least 1".to_string());
        }
        if self.gold.top_k == 0 {
            return Err("gold.top_k must be at least 1".to_string());
        }
        self.gold.tiers().validate()?;
        if !(0.0..=1.0).contains(&self.gold.decision_threshold) {
            return Err(format!(
                "gold.decision_threshold {} is outside [0, 1]",
                self.gold.decision_threshold
            ));
        }
        if !(0.0..1.0).contains(&self.split.test_fraction) {
            return Err(format!(
                "split.test_fraction {} is outside [0, 1)",
                self.split.test_fraction
            ));
        }
        Ok(())
    }
}

/// Path of the config file under the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load and validate the config at `path`.
pub fn load_from(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate().map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(config)
}

/// Load the app-root config, returning defaults if it does not exist.
pub fn load_or_default() -> Result<PipelineConfig, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    load_from(&path)
}

/// Write `config` to `path`, creating parent directories as needed.
pub fn save_to_path(config: &PipelineConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
