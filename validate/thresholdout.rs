//! # Thresholdout Release Mechanism
//!
//! Answers "what is this model's generalization error?" against a protected
//! holdout set in a way that stays valid when the question is asked over and
//! over by an adaptive analyst.
//!
//! Given the final cross-validation estimate `final_err` and the error
//! `holdout_err` of the same predictor on the holdout rows, one query draws
//! `eta1 ~ N(0, tolerance)` and
//!
//! - if `|final_err - holdout_err| < threshold + eta1`, releases `final_err`;
//! - otherwise draws an independent `eta2 ~ N(0, tolerance)` and releases
//!   `holdout_err + eta2`.
//!
//! The holdout set is sealed: its rows are private to this module and are only
//! read by `holdout_error`. Per-row predictions, per-row errors and the raw
//! `holdout_err` are locals of a single call frame and are dropped before the
//! query returns; a `Release` carries nothing but the released value and the
//! branch that produced it. None of them are logged.
//!
//! Each query seeds its own `StdRng`, so a query is a pure function of
//! `(final_err, holdout rows, threshold, tolerance, seed)`. No query budget is
//! tracked here; `ReleaseLedger` is the hook for callers who want one.

use crate::crossval::FinalEstimate;
use crate::data::{DataError, Dataset};
use crate::error::{ConfigurationError, ValidationError};
use crate::model::{ModelFitError, Predictor, checked_predict, misclassification};
use crate::partition::CvPartition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::fmt;

/// Rows withheld from every training view. Created only by the partitioner.
pub struct HoldoutSet {
    rows: Vec<usize>,
}

impl fmt::Debug for HoldoutSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoldoutSet")
            .field("len", &self.rows.len())
            .finish_non_exhaustive()
    }
}

impl HoldoutSet {
    pub(crate) fn seal(rows: Vec<usize>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Confirms that `cv` and this holdout set partition `0..cv.n_rows()`:
    /// every row belongs to exactly one of them.
    pub fn check_partition(&self, cv: &CvPartition) -> Result<(), DataError> {
        let n_rows = cv.n_rows();
        let mut seen = vec![false; n_rows];
        for &row in cv.rows().iter().chain(self.rows.iter()) {
            match seen.get_mut(row) {
                None => return Err(DataError::RowOutOfRange { row, n_rows }),
                Some(true) => return Err(DataError::PartitionOverlap(row)),
                Some(flag) => *flag = true,
            }
        }
        match seen.iter().position(|&covered| !covered) {
            Some(row) => Err(DataError::PartitionIncomplete(row)),
            None => Ok(()),
        }
    }
}

/// Per-query parameters. Never persisted as counters between queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdoutParams {
    /// Agreement threshold `tau` between the training and holdout errors.
    pub threshold: f64,
    /// Standard deviation `sigma` of the Gaussian noise.
    pub tolerance: f64,
    pub seed: u64,
}

impl ThresholdoutParams {
    pub fn new(threshold: f64, tolerance: f64, seed: u64) -> Result<Self, ConfigurationError> {
        let params = Self {
            threshold,
            tolerance,
            seed,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(ConfigurationError::NonPositiveThreshold(self.threshold));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigurationError::NonPositiveTolerance(self.tolerance));
        }
        Ok(())
    }
}

/// Which side of the threshold test produced a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseBranch {
    /// The training estimate tracked the holdout closely and was released as is.
    Cheap,
    /// A noised holdout estimate was released.
    Expensive,
}

/// The only value a thresholdout query hands back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Release {
    value: f64,
    branch: ReleaseBranch,
}

impl Release {
    /// The released generalization-error estimate.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn branch(&self) -> ReleaseBranch {
        self.branch
    }
}

/// Extension point for query accounting across calls on one holdout set.
///
/// `before_release` runs before the holdout is scored and may refuse the
/// query with `ValidationError::QueryRefused`; `after_release` observes every
/// answered query. No policy ships with the crate beyond `Unmetered`.
pub trait ReleaseLedger {
    fn before_release(&mut self) -> Result<(), ValidationError>;

    fn after_release(&mut self, release: &Release);
}

/// A ledger that admits every query and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmetered;

impl ReleaseLedger for Unmetered {
    fn before_release(&mut self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn after_release(&mut self, _: &Release) {}
}

/// Runs one thresholdout query without query accounting.
pub fn thresholdout<P: Predictor>(
    estimate: &FinalEstimate<P>,
    holdout: &HoldoutSet,
    dataset: &Dataset,
    params: &ThresholdoutParams,
) -> Result<Release, ValidationError> {
    thresholdout_with_ledger(estimate, holdout, dataset, params, &mut Unmetered)
}

/// Runs one thresholdout query, consulting `ledger` before and after.
pub fn thresholdout_with_ledger<P: Predictor, L: ReleaseLedger + ?Sized>(
    estimate: &FinalEstimate<P>,
    holdout: &HoldoutSet,
    dataset: &Dataset,
    params: &ThresholdoutParams,
    ledger: &mut L,
) -> Result<Release, ValidationError> {
    params.validate()?;
    if holdout.is_empty() {
        return Err(DataError::EmptyHoldout.into());
    }
    if let Some(&last) = holdout.rows.last() {
        if last >= dataset.n_rows() {
            return Err(DataError::RowOutOfRange {
                row: last,
                n_rows: dataset.n_rows(),
            }
            .into());
        }
    }

    ledger.before_release()?;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let release = release(
        estimate.error(),
        estimate.predictor(),
        holdout,
        dataset,
        params,
        &mut rng,
    )?;

    ledger.after_release(&release);
    log::info!(
        "Thresholdout released {:.4} ({:?} branch)",
        release.value,
        release.branch
    );
    Ok(release)
}

fn release<P: Predictor, R: Rng + ?Sized>(
    final_err: f64,
    predictor: &P,
    holdout: &HoldoutSet,
    dataset: &Dataset,
    params: &ThresholdoutParams,
    rng: &mut R,
) -> Result<Release, ValidationError> {
    let noise = Normal::new(0.0, params.tolerance)
        .map_err(|_| ConfigurationError::NonPositiveTolerance(params.tolerance))?;
    let holdout_err = holdout_error(predictor, holdout, dataset)?;
    Ok(decide(final_err, holdout_err, params.threshold, &noise, rng))
}

/// Mean 0/1 error of `predictor` on the holdout rows. The predictor sees the
/// holdout features only; labels are read here, after prediction. The per-row
/// probabilities and errors do not outlive this frame.
fn holdout_error<P: Predictor>(
    predictor: &P,
    holdout: &HoldoutSet,
    dataset: &Dataset,
) -> Result<f64, ModelFitError> {
    let view = dataset.view(&holdout.rows);
    let probabilities = checked_predict(predictor, &view.without_labels())?;
    let labels = view.labels();
    let errors = misclassification(probabilities.view(), labels.view());
    Ok(errors.mean().unwrap_or(f64::NAN))
}

fn decide<R: Rng + ?Sized>(
    final_err: f64,
    holdout_err: f64,
    threshold: f64,
    noise: &Normal<f64>,
    rng: &mut R,
) -> Release {
    let eta1 = noise.sample(rng);
    if (final_err - holdout_err).abs() < threshold + eta1 {
        Release {
            value: final_err,
            branch: ReleaseBranch::Cheap,
        }
    } else {
        let eta2 = noise.sample(rng);
        Release {
            value: holdout_err + eta2,
            branch: ReleaseBranch::Expensive,
        }
    }
}
