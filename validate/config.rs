//! Experiment configuration, stored as TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Command-line flags override values read from a file.

use crate::error::ConfigurationError;
use crate::logistic::LogisticRegression;
use crate::thresholdout::ThresholdoutParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};

/// Settings of one partition-and-validate experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of cross-validation folds `K`; the holdout is fold `K + 1`.
    pub folds: usize,
    /// Seed of the fold assignment.
    pub seed: u64,
    pub label_column: String,
    /// Feature columns in model order. `None` uses every non-label column.
    pub feature_columns: Option<Vec<String>>,
    pub model: LogisticRegression,
    pub thresholdout: Option<ThresholdoutConfig>,
}

/// Thresholdout settings as written in a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdoutConfig {
    pub threshold: f64,
    pub tolerance: f64,
    /// Query seed. Falls back to the experiment seed when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 1,
            label_column: "label".to_string(),
            feature_columns: None,
            model: LogisticRegression::default(),
            thresholdout: None,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.folds < 1 {
            return Err(ConfigurationError::InvalidFoldCount(self.folds));
        }
        self.model.validate()?;
        if let Some(params) = self.thresholdout_params() {
            params.validate()?;
        }
        Ok(())
    }

    /// Query parameters, if a `[thresholdout]` table is present.
    pub fn thresholdout_params(&self) -> Option<ThresholdoutParams> {
        self.thresholdout.map(|t| ThresholdoutParams {
            threshold: t.threshold,
            tolerance: t.tolerance,
            seed: t.seed.unwrap_or(self.seed),
        })
    }

    /// Saves the configuration in a human-readable TOML format.
    pub fn save(&self, path: &str) -> Result<(), ConfigurationError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigurationError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }
}
