//! Sampler configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [database]
//! path = "sampler_data_v2.db"
//!
//! [sampling]
//! target_overall_selection_rate = 0.01
//! estimated_unprotected_ratio = 0.80
//! on_history_unavailable = "assume_empty"
//! ```
//!
//! Every key is optional and falls back to the values shown.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::HistoryPolicy;

pub const DEFAULT_DATABASE_PATH: &str = "sampler_data_v2.db";
pub const DEFAULT_TARGET_OVERALL_SELECTION_RATE: f64 = 0.01;
pub const DEFAULT_ESTIMATED_UNPROTECTED_RATIO: f64 = 0.80;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name} must be between 0 (exclusive) and 1 (inclusive), got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub target_overall_selection_rate: f64,
    pub estimated_unprotected_ratio: f64,
    pub on_history_unavailable: HistoryPolicy,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target_overall_selection_rate: DEFAULT_TARGET_OVERALL_SELECTION_RATE,
            estimated_unprotected_ratio: DEFAULT_ESTIMATED_UNPROTECTED_RATIO,
            on_history_unavailable: HistoryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub database: DatabaseConfig,
    pub sampling: SamplingConfig,
}

impl SamplerConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!(
            config = %path.display(),
            database = %config.database.path.display(),
            "loaded sampler configuration"
        );
        Ok(config)
    }

    /// Parse and validate.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SamplerConfig = toml::from_str(raw)?;
        config.rates()?;
        Ok(config)
    }

    /// Override the configured database location.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = path.into();
        self
    }

    pub fn rates(&self) -> Result<SamplingRates, ConfigError> {
        SamplingRates::new(
            self.sampling.target_overall_selection_rate,
            self.sampling.estimated_unprotected_ratio,
        )
    }
}

/// The two rate parameters of a run, both checked to lie in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingRates {
    target_overall_rate: f64,
    estimated_eligible_ratio: f64,
}

impl SamplingRates {
    pub fn new(target_overall_rate: f64, estimated_eligible_ratio: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            target_overall_rate: check_rate("target_overall_selection_rate", target_overall_rate)?,
            estimated_eligible_ratio: check_rate(
                "estimated_unprotected_ratio",
                estimated_eligible_ratio,
            )?,
        })
    }

    pub fn target_overall_rate(&self) -> f64 {
        self.target_overall_rate
    }

    pub fn estimated_eligible_ratio(&self) -> f64 {
        self.estimated_eligible_ratio
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::RateOutOfRange { name, value })
    }
}
