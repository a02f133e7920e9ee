//! Built-in ridge-penalised logistic regression, fitted by iteratively
//! reweighted least squares.
//!
//! This is the default `Classifier` used by the command-line front end. Any
//! other model can be substituted through the traits in `model`.

use crate::data::{FeatureView, RowView};
use crate::error::ConfigurationError;
use crate::faer_ndarray::FaerCholesky;
use crate::model::{Classifier, ModelFitError, Predictor};
use faer::Side;
use ndarray::{Array1, Array2, Axis, s};
use serde::{Deserialize, Serialize};

const ETA_CLAMP: f64 = 700.0;
const PROB_EPS: f64 = 1e-8;
const MIN_WEIGHT: f64 = 1e-6;

/// Hyperparameters of the logistic model. The intercept is never penalised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegression {
    pub ridge: f64,
    pub max_iterations: usize,
    pub convergence_tolerance: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            ridge: 1e-3,
            max_iterations: 50,
            convergence_tolerance: 1e-8,
        }
    }
}

impl LogisticRegression {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.ridge.is_finite() && self.ridge >= 0.0) {
            return Err(ConfigurationError::InvalidModelSetting {
                name: "ridge",
                reason: format!("must be finite and non-negative, got {}", self.ridge),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigurationError::InvalidModelSetting {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.convergence_tolerance.is_finite() && self.convergence_tolerance > 0.0) {
            return Err(ConfigurationError::InvalidModelSetting {
                name: "convergence_tolerance",
                reason: format!(
                    "must be finite and positive, got {}",
                    self.convergence_tolerance
                ),
            });
        }
        Ok(())
    }
}

/// A fitted logistic model. `coefficients[0]` is the intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticPredictor {
    pub coefficients: Array1<f64>,
    pub converged: bool,
}

fn with_intercept(x: &Array2<f64>) -> Array2<f64> {
    let mut design = Array2::ones((x.nrows(), x.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(x);
    design
}

fn inverse_logit(eta: &Array1<f64>) -> Array1<f64> {
    eta.mapv(|e| {
        let e = e.clamp(-ETA_CLAMP, ETA_CLAMP);
        (1.0 / (1.0 + (-e).exp())).clamp(PROB_EPS, 1.0 - PROB_EPS)
    })
}

impl Classifier for LogisticRegression {
    type Predictor = LogisticPredictor;

    fn fit(&self, train: &RowView<'_>) -> Result<LogisticPredictor, ModelFitError> {
        if train.is_empty() {
            return Err(ModelFitError::Fit(
                "cannot fit a logistic model on zero rows".to_string(),
            ));
        }
        let x = with_intercept(&train.features());
        let y = train.labels();
        let p = x.ncols();

        let mut penalty = Array1::from_elem(p, self.ridge);
        penalty[0] = 0.0;
        // A tiny intercept jitter keeps the system definite when ridge is zero.
        let jitter = 1e-10;

        let mut beta = Array1::<f64>::zeros(p);
        for iter in 1..=self.max_iterations {
            let eta = x.dot(&beta);
            let mu = inverse_logit(&eta);
            let weights = (&mu * (1.0 - &mu)).mapv(|w| w.max(MIN_WEIGHT));

            let gradient = x.t().dot(&(&y - &mu)) - &penalty * &beta;
            let weighted = &x * &weights.view().insert_axis(Axis(1));
            let mut hessian = x.t().dot(&weighted);
            for j in 0..p {
                hessian[[j, j]] += penalty[j] + jitter;
            }

            let step = hessian
                .cholesky(Side::Lower)
                .map_err(|e| {
                    ModelFitError::Fit(format!(
                        "IRLS Hessian is not positive definite at iteration {iter}: {e}"
                    ))
                })?
                .solve_vec(&gradient);
            beta += &step;

            if beta.iter().any(|b| !b.is_finite()) {
                return Err(ModelFitError::Fit(format!(
                    "non-finite coefficients at iteration {iter}"
                )));
            }

            let max_step = step.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            log::trace!("IRLS iteration {iter}: max |step| = {max_step:.3e}");
            if max_step < self.convergence_tolerance {
                log::debug!("Logistic IRLS converged after {iter} iterations");
                return Ok(LogisticPredictor {
                    coefficients: beta,
                    converged: true,
                });
            }
        }

        log::warn!(
            "Logistic IRLS did not converge within {} iterations; using the last iterate.",
            self.max_iterations
        );
        Ok(LogisticPredictor {
            coefficients: beta,
            converged: false,
        })
    }
}

impl Predictor for LogisticPredictor {
    fn predict(&self, view: &FeatureView<'_>) -> Result<Array1<f64>, ModelFitError> {
        if view.n_features() + 1 != self.coefficients.len() {
            return Err(ModelFitError::Predict(format!(
                "model has {} feature coefficients but the view has {} features",
                self.coefficients.len().saturating_sub(1),
                view.n_features()
            )));
        }
        let x = with_intercept(&view.features());
        Ok(inverse_logit(&x.dot(&self.coefficients)))
    }
}
