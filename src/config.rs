// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use serde::{Deserialize, Serialize};
use crate::error::{TubError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Batch and train/validation split parameters.
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Parameters for the train/validation generators.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Number of records per generated batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fraction of readable records assigned to the training split.
    #[serde(default = "default_train_frac")]
    pub train_frac: f64,
    /// Seed for the split shuffle. The same seed over the same records
    /// always yields the same split.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            train_frac: default_train_frac(),
            seed: default_seed(),
        }
    }
}

fn default_batch_size() -> usize { 128 }
fn default_train_frac() -> f64 { 0.8 }
fn default_seed() -> u64 { 0x7475_6273 }

impl TrainingConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_train_frac(mut self, train_frac: f64) -> Self {
        self.train_frac = train_frac;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TubError::Config("batch_size must be > 0".into()));
        }
        if !(self.train_frac > 0.0 && self.train_frac < 1.0) {
            return Err(TubError::Config("train_frac must be in (0, 1)".into()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TubError::Config(format!("Cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| TubError::Config(format!("Invalid TOML: {e}")))?;
        config.training.validate()?;
        Ok(config)
    }
}
