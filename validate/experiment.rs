//! An experiment owns a dataset and the partition drawn for it once, and
//! answers cross-validation and thresholdout requests against that fixed
//! partition. Cross-validation results are recorded per model id.

use crate::config::ExperimentConfig;
use crate::crossval::{CrossValidation, FinalEstimate, cross_validate};
use crate::data::Dataset;
use crate::error::ValidationError;
use crate::model::{Classifier, Predictor};
use crate::partition::{CvPartition, split};
use crate::thresholdout::{
    HoldoutSet, Release, ReleaseLedger, ThresholdoutParams, thresholdout, thresholdout_with_ledger,
};
use std::collections::BTreeMap;

/// Model-level errors recorded for one model id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSummary {
    pub train_err: f64,
    pub test_err: f64,
    pub final_err: f64,
}

#[derive(Debug)]
pub struct Experiment {
    dataset: Dataset,
    partition: CvPartition,
    holdout: HoldoutSet,
    seed: u64,
    summaries: BTreeMap<String, ModelSummary>,
}

impl Experiment {
    /// Partitions `dataset` into `k` cross-validation folds plus a holdout fold.
    pub fn new(dataset: Dataset, k: usize, seed: u64) -> Result<Self, ValidationError> {
        let (partition, holdout) = split(dataset.n_rows(), k, seed)?;
        holdout.check_partition(&partition)?;
        log::info!(
            "Partitioned {} rows: {} cross-validation rows in {} folds {:?}, {} holdout rows",
            dataset.n_rows(),
            partition.len(),
            k,
            partition.fold_sizes(),
            holdout.len()
        );
        Ok(Self {
            dataset,
            partition,
            holdout,
            seed,
            summaries: BTreeMap::new(),
        })
    }

    pub fn from_config(dataset: Dataset, config: &ExperimentConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Self::new(dataset, config.folds, config.seed)
    }

    /// Fold counts of the cross-validation partition. Row membership is not exposed.
    pub fn partition(&self) -> &CvPartition {
        &self.partition
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn holdout_len(&self) -> usize {
        self.holdout.len()
    }

    /// Cross-validates `classifier` and records its errors under `model_id`.
    /// A later run under the same id replaces the earlier record.
    pub fn cross_validate<C: Classifier>(
        &mut self,
        model_id: &str,
        classifier: &C,
    ) -> Result<CrossValidation<C::Predictor>, ValidationError> {
        let result = cross_validate(&self.dataset, &self.partition, classifier)?;
        let summary = ModelSummary {
            train_err: result.train_err,
            test_err: result.test_err,
            final_err: result.final_estimate.error(),
        };
        log::info!(
            "Model '{model_id}': train error {:.4}, test error {:.4}, final error {:.4}",
            summary.train_err,
            summary.test_err,
            summary.final_err
        );
        self.summaries.insert(model_id.to_string(), summary);
        Ok(result)
    }

    pub fn summary(&self, model_id: &str) -> Option<&ModelSummary> {
        self.summaries.get(model_id)
    }

    /// Recorded summaries in model-id order.
    pub fn summaries(&self) -> impl Iterator<Item = (&str, &ModelSummary)> {
        self.summaries.iter().map(|(id, s)| (id.as_str(), s))
    }

    /// Issues one thresholdout query against this experiment's holdout set.
    pub fn thresholdout<P: Predictor>(
        &self,
        estimate: &FinalEstimate<P>,
        params: &ThresholdoutParams,
    ) -> Result<Release, ValidationError> {
        thresholdout(estimate, &self.holdout, &self.dataset, params)
    }

    pub fn thresholdout_with_ledger<P: Predictor, L: ReleaseLedger + ?Sized>(
        &self,
        estimate: &FinalEstimate<P>,
        params: &ThresholdoutParams,
        ledger: &mut L,
    ) -> Result<Release, ValidationError> {
        thresholdout_with_ledger(estimate, &self.holdout, &self.dataset, params, ledger)
    }
}
