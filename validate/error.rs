//! Crate-level error taxonomy.
//!
//! Each subsystem owns the error enum for the failures it can detect
//! (`DataError` lives next to the dataset code, `ModelFitError` next to the
//! model traits). `ValidationError` is the single type surfaced by the
//! experiment-level operations. Nothing here is retried: a stochastic fit that
//! is silently re-run would change which outcome gets reported.

use crate::data::DataError;
use crate::model::ModelFitError;
use thiserror::Error;

/// Invalid parameters supplied by the caller, or an unreadable configuration file.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("The number of cross-validation folds must be at least 1, but {0} was given.")]
    InvalidFoldCount(usize),

    #[error("The thresholdout threshold must be a finite value greater than zero, but {0} was given.")]
    NonPositiveThreshold(f64),

    #[error("The thresholdout tolerance (noise scale) must be a finite value greater than zero, but {0} was given.")]
    NonPositiveTolerance(f64),

    #[error("The logistic model setting '{name}' is invalid: {reason}")]
    InvalidModelSetting { name: &'static str, reason: String },

    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Every failure an experiment-level operation can report.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    ModelFit(#[from] ModelFitError),

    /// A `ReleaseLedger` declined to answer another thresholdout query.
    #[error("Thresholdout query refused: {0}")]
    QueryRefused(String),
}
