//! The pluggable model capability.
//!
//! The partitioning, cross-validation and thresholdout code never knows which
//! model it is driving. A `Classifier` fits a `Predictor` on a labeled training
//! view; the predictor returns one class-1 probability per row of a
//! features-only view, so it never sees the labels of the rows it scores. Both
//! traits are thread-safe so replicates can be fitted in parallel.

use crate::data::{FeatureView, RowView};
use ndarray::{Array1, ArrayView1, Zip};
use thiserror::Error;

/// A fitted model: maps rows to class-1 probabilities.
pub trait Predictor: Send + Sync {
    /// Returns one probability in `[0, 1]` per row of `view`, in view order.
    fn predict(&self, view: &FeatureView<'_>) -> Result<Array1<f64>, ModelFitError>;
}

/// A model type that can be fitted on a training view.
pub trait Classifier: Sync {
    type Predictor: Predictor;

    fn fit(&self, train: &RowView<'_>) -> Result<Self::Predictor, ModelFitError>;
}

/// Failures of the external model collaborator. Always fatal to the run.
#[derive(Error, Debug)]
pub enum ModelFitError {
    #[error("Model fitting failed: {0}")]
    Fit(String),

    #[error("Model prediction failed: {0}")]
    Predict(String),

    #[error("The predictor returned {found} probabilities for a view of {expected} rows.")]
    LengthMismatch { found: usize, expected: usize },

    #[error("The predictor returned {value} at position {position}, which is not a probability in [0, 1].")]
    InvalidProbability { position: usize, value: f64 },

    #[error("Cross-validation replicate {replicate} failed: {source}")]
    InReplicate {
        replicate: usize,
        #[source]
        source: Box<ModelFitError>,
    },
}

impl ModelFitError {
    /// Attaches the replicate index to a collaborator failure.
    pub fn in_replicate(self, replicate: usize) -> Self {
        ModelFitError::InReplicate {
            replicate,
            source: Box::new(self),
        }
    }
}

/// Runs `predictor` on `view` and checks the shape and range of its output.
pub(crate) fn checked_predict<P: Predictor + ?Sized>(
    predictor: &P,
    view: &FeatureView<'_>,
) -> Result<Array1<f64>, ModelFitError> {
    let probabilities = predictor.predict(view)?;
    if probabilities.len() != view.len() {
        return Err(ModelFitError::LengthMismatch {
            found: probabilities.len(),
            expected: view.len(),
        });
    }
    if let Some((position, &value)) = probabilities
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0 || **p > 1.0)
    {
        return Err(ModelFitError::InvalidProbability { position, value });
    }
    Ok(probabilities)
}

/// Per-row 0/1 misclassification. The predicted class is the rounded
/// probability, so exactly 0.5 is predicted as class 1.
pub(crate) fn misclassification(
    probabilities: ArrayView1<f64>,
    labels: ArrayView1<f64>,
) -> Array1<f64> {
    Zip::from(probabilities)
        .and(labels)
        .map_collect(|&p, &y| if p.round() == y { 0.0 } else { 1.0 })
}

/// Mean 0/1 error of `predictor` over `view`. `NaN` for an empty view.
pub(crate) fn mean_error<P: Predictor + ?Sized>(
    predictor: &P,
    view: &RowView<'_>,
) -> Result<f64, ModelFitError> {
    if view.is_empty() {
        return Ok(f64::NAN);
    }
    let probabilities = checked_predict(predictor, &view.without_labels())?;
    let labels = view.labels();
    let errors = misclassification(probabilities.view(), labels.view());
    Ok(errors.mean().unwrap_or(f64::NAN))
}
