//! # Cross-Validation Driver
//!
//! Fits the external classifier once per replicate on the train rows, scores
//! the resulting predictor on both the train and the test rows with a 0/1
//! loss, and averages the per-replicate errors into model-level estimates.
//! It then refits on the entire cross-validation partition to produce the
//! `FinalEstimate`, which is what thresholdout queries protect.
//!
//! Replicates are independent, so they are evaluated in parallel with `rayon`.
//! Results are collected in replicate order, which makes the aggregate
//! identical to a serial run. A collaborator failure in any replicate aborts
//! the whole run: dropping a replicate would bias the mean.
//!
//! This module never sees the holdout set.

use crate::data::{DataError, Dataset};
use crate::error::ValidationError;
use crate::model::{Classifier, mean_error};
use crate::partition::CvPartition;
use crate::replicate::{Replicate, replicate};
use rayon::prelude::*;

/// Mean train and test error of one replicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRecord {
    pub replicate: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub train_err: f64,
    /// `NaN` when the replicate's test fold is empty.
    pub test_err: f64,
}

/// The error of a model refit on every cross-validation row, together with
/// the fitted predictor that produced it.
#[derive(Debug, Clone)]
pub struct FinalEstimate<P> {
    error: f64,
    predictor: P,
}

impl<P> FinalEstimate<P> {
    pub fn new(error: f64, predictor: P) -> Self {
        Self { error, predictor }
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }
}

/// Outcome of a full cross-validation run for one model.
#[derive(Debug, Clone)]
pub struct CrossValidation<P> {
    pub records: Vec<ErrorRecord>,
    /// Mean of the per-replicate train errors.
    pub train_err: f64,
    /// Mean of the per-replicate test errors, ignoring replicates with an empty test fold.
    pub test_err: f64,
    pub final_estimate: FinalEstimate<P>,
}

fn check_partition_matches(
    dataset: &Dataset,
    partition: &CvPartition,
) -> Result<(), DataError> {
    if partition.n_rows() != dataset.n_rows() {
        return Err(DataError::PartitionSizeMismatch {
            partition_rows: partition.n_rows(),
            dataset_rows: dataset.n_rows(),
        });
    }
    Ok(())
}

/// Fits `classifier` on the train rows of `replicate` and scores it on both roles.
pub fn score_replicate<C: Classifier>(
    dataset: &Dataset,
    replicate: Replicate<'_>,
    classifier: &C,
) -> Result<ErrorRecord, ValidationError> {
    let index = replicate.index();
    let train_rows = replicate.train_rows();
    let test_rows = replicate.test_rows();
    if train_rows.is_empty() {
        return Err(DataError::EmptyTrainingSet { replicate: index }.into());
    }

    let train = dataset.view(&train_rows);
    let test = dataset.view(&test_rows);
    let predictor = classifier
        .fit(&train)
        .map_err(|e| e.in_replicate(index))?;
    let train_err = mean_error(&predictor, &train).map_err(|e| e.in_replicate(index))?;
    let test_err = mean_error(&predictor, &test).map_err(|e| e.in_replicate(index))?;

    log::debug!(
        "Replicate {index}: {} train rows (error {train_err:.4}), {} test rows (error {test_err:.4})",
        train_rows.len(),
        test_rows.len()
    );

    Ok(ErrorRecord {
        replicate: index,
        n_train: train_rows.len(),
        n_test: test_rows.len(),
        train_err,
        test_err,
    })
}

/// Fits `classifier` on every cross-validation row and scores it on the same rows.
pub fn fit_final<C: Classifier>(
    dataset: &Dataset,
    partition: &CvPartition,
    classifier: &C,
) -> Result<FinalEstimate<C::Predictor>, ValidationError> {
    check_partition_matches(dataset, partition)?;
    if partition.is_empty() {
        return Err(DataError::EmptyCvPartition.into());
    }
    let view = dataset.view(partition.rows());
    let predictor = classifier.fit(&view)?;
    let error = mean_error(&predictor, &view)?;
    log::info!(
        "Final model fitted on {} cross-validation rows; training error {error:.4}",
        view.len()
    );
    Ok(FinalEstimate::new(error, predictor))
}

/// Averages per-replicate records into `(train_err, test_err)`.
pub fn aggregate(records: &[ErrorRecord]) -> (f64, f64) {
    fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
        let (sum, count) = values.fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    let skipped = records.iter().filter(|r| r.test_err.is_nan()).count();
    if skipped > 0 {
        log::warn!(
            "{skipped} replicate(s) have an empty test fold and are excluded from the test error mean"
        );
    }
    let train_err = mean_of(records.iter().map(|r| r.train_err));
    let test_err = mean_of(
        records
            .iter()
            .map(|r| r.test_err)
            .filter(|e| !e.is_nan()),
    );
    (train_err, test_err)
}

/// Runs K-fold cross-validation over `partition` and fits the final model.
pub fn cross_validate<C: Classifier>(
    dataset: &Dataset,
    partition: &CvPartition,
    classifier: &C,
) -> Result<CrossValidation<C::Predictor>, ValidationError> {
    check_partition_matches(dataset, partition)?;

    let records = replicate(partition)
        .into_par_iter()
        .map(|rep| score_replicate(dataset, rep, classifier))
        .collect::<Result<Vec<_>, _>>()?;

    let (train_err, test_err) = aggregate(&records);
    log::info!(
        "Cross-validation over {} replicates: train error {train_err:.4}, test error {test_err:.4}",
        records.len()
    );

    let final_estimate = fit_final(dataset, partition, classifier)?;
    Ok(CrossValidation {
        records,
        train_err,
        test_err,
        final_estimate,
    })
}
