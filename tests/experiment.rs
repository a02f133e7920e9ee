use holdout::config::{ExperimentConfig, ThresholdoutConfig};
use holdout::crossval::FinalEstimate;
use holdout::data::{Dataset, FeatureView, load_dataset};
use holdout::error::{ConfigurationError, ValidationError};
use holdout::experiment::Experiment;
use holdout::logistic::LogisticRegression;
use holdout::model::{ModelFitError, Predictor};
use holdout::partition::split;
use holdout::thresholdout::{Release, ReleaseBranch, ReleaseLedger, ThresholdoutParams};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Two informative features and one noise feature; labels follow a logistic model.
fn synthetic_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let features: Array2<f64> = Array2::from_shape_fn((n, 3), |_| rng.sample(StandardNormal));
    let labels: Array1<f64> = features
        .rows()
        .into_iter()
        .map(|row| {
            let eta = -0.2 + 1.8 * row[0] - 1.2 * row[1];
            let prob = 1.0 / (1.0 + (-eta).exp());
            if rng.random::<f64>() < prob { 1.0 } else { 0.0 }
        })
        .collect();
    let names = vec!["x1".to_string(), "x2".to_string(), "noise".to_string()];
    Dataset::new(features, labels, names).unwrap()
}

#[test]
fn twelve_hundred_rows_split_reproducibly_into_six_folds() {
    let first = Experiment::new(synthetic_dataset(1200, 4), 5, 1).unwrap();
    let second = Experiment::new(synthetic_dataset(1200, 4), 5, 1).unwrap();

    assert_eq!(first.partition(), second.partition());
    assert_eq!(first.holdout_len(), second.holdout_len());
    assert_eq!(first.partition().len() + first.holdout_len(), 1200);

    let mut sizes = first.partition().fold_sizes();
    sizes.push(first.holdout_len());
    assert_eq!(sizes.len(), 6);
    for size in sizes {
        assert!((135..=265).contains(&size), "fold size {size} too far from 200");
    }
}

#[test]
fn split_depends_only_on_row_count_k_and_seed() {
    let (a, ha) = split(1200, 5, 1).unwrap();
    let (b, hb) = split(1200, 5, 1).unwrap();
    assert_eq!(a, b);
    assert_eq!(ha.len(), hb.len());
    let (c, _) = split(1200, 5, 2).unwrap();
    assert_ne!(a, c);
}

#[test]
fn logistic_model_cross_validates_and_queries_the_holdout() {
    let mut experiment = Experiment::new(synthetic_dataset(1500, 10), 5, 7).unwrap();
    let result = experiment
        .cross_validate("logistic", &LogisticRegression::default())
        .unwrap();

    assert_eq!(result.records.len(), 5);
    assert!(result.train_err < 0.35, "train error {}", result.train_err);
    assert!(result.test_err < 0.35, "test error {}", result.test_err);
    assert!(result.final_estimate.error() < 0.35);

    let summary = experiment.summary("logistic").copied().unwrap();
    assert_eq!(summary.train_err, result.train_err);
    assert_eq!(summary.test_err, result.test_err);
    assert_eq!(summary.final_err, result.final_estimate.error());

    let params = ThresholdoutParams::new(0.04, 0.01, 3).unwrap();
    let first = experiment
        .thresholdout(&result.final_estimate, &params)
        .unwrap();
    let second = experiment
        .thresholdout(&result.final_estimate, &params)
        .unwrap();
    assert_eq!(first, second);
    match first.branch() {
        ReleaseBranch::Cheap => assert_eq!(first.value(), result.final_estimate.error()),
        ReleaseBranch::Expensive => assert!((first.value() - 0.25).abs() < 0.25),
    }
}

#[test]
fn summaries_are_kept_per_model_id() {
    let mut experiment = Experiment::new(synthetic_dataset(600, 1), 4, 2).unwrap();
    experiment
        .cross_validate("ridge-small", &LogisticRegression::default())
        .unwrap();
    experiment
        .cross_validate(
            "ridge-large",
            &LogisticRegression {
                ridge: 50.0,
                ..LogisticRegression::default()
            },
        )
        .unwrap();

    let ids: Vec<&str> = experiment.summaries().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["ridge-large", "ridge-small"]);
    assert!(experiment.summary("missing").is_none());
}

#[test]
fn zero_folds_is_rejected_by_the_experiment() {
    assert!(matches!(
        Experiment::new(synthetic_dataset(50, 1), 0, 1),
        Err(ValidationError::Configuration(
            ConfigurationError::InvalidFoldCount(0)
        ))
    ));
}

#[test]
fn tsv_and_toml_drive_a_full_query() {
    let dataset = synthetic_dataset(400, 21);
    let mut tsv = NamedTempFile::new().unwrap();
    writeln!(tsv, "sample_id\tx1\tx2\tnoise\toutcome").unwrap();
    for (i, (row, label)) in dataset
        .features()
        .rows()
        .into_iter()
        .zip(dataset.labels().iter())
        .enumerate()
    {
        writeln!(
            tsv,
            "s{}\t{}\t{}\t{}\t{}",
            i, row[0], row[1], row[2], *label as u8
        )
        .unwrap();
    }
    tsv.flush().unwrap();

    let config = ExperimentConfig {
        folds: 3,
        seed: 11,
        label_column: "outcome".to_string(),
        feature_columns: Some(vec!["x1".to_string(), "x2".to_string()]),
        thresholdout: Some(ThresholdoutConfig {
            threshold: 0.05,
            tolerance: 0.01,
            seed: Some(5),
        }),
        ..ExperimentConfig::default()
    };
    let toml_file = NamedTempFile::new().unwrap();
    config.save(toml_file.path().to_str().unwrap()).unwrap();
    let config = ExperimentConfig::load(toml_file.path().to_str().unwrap()).unwrap();

    let loaded = load_dataset(
        tsv.path().to_str().unwrap(),
        &config.label_column,
        config.feature_columns.as_deref(),
    )
    .unwrap();
    assert_eq!(loaded.n_rows(), 400);
    assert_eq!(loaded.n_features(), 2);
    assert_eq!(loaded.labels(), dataset.labels());

    let mut experiment = Experiment::from_config(loaded, &config).unwrap();
    let result = experiment.cross_validate("tsv", &config.model).unwrap();
    let params = config.thresholdout_params().unwrap();
    assert_eq!(params.seed, 5);
    let release = experiment
        .thresholdout(&result.final_estimate, &params)
        .unwrap();
    assert!(release.value().is_finite());
}

/// Keeps a copy of every feature matrix it is asked to score.
struct Recorder(Mutex<Vec<Array2<f64>>>);

impl Predictor for Recorder {
    fn predict(&self, view: &FeatureView<'_>) -> Result<Array1<f64>, ModelFitError> {
        self.0.lock().unwrap().push(view.features());
        Ok(Array1::zeros(view.len()))
    }
}

#[test]
fn holdout_queries_reveal_nothing_but_the_release() {
    let base = synthetic_dataset(300, 17);
    let flipped = Dataset::new(
        base.features().to_owned(),
        base.labels().mapv(|y| 1.0 - y),
        base.feature_names().to_vec(),
    )
    .unwrap();
    let params = ThresholdoutParams::new(0.05, 0.01, 8).unwrap();

    let mut seen = Vec::new();
    let mut partitions = Vec::new();
    for dataset in [base, flipped] {
        let experiment = Experiment::new(dataset, 4, 3).unwrap();
        let estimate = FinalEstimate::new(0.5, Recorder(Mutex::new(Vec::new())));
        experiment.thresholdout(&estimate, &params).unwrap();
        seen.push(estimate.predictor().0.lock().unwrap().clone());
        partitions.push(format!("{:?}", experiment.partition()));
    }

    // Flipping every label changes nothing a predictor or the partition report shows.
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[0], seen[1]);
    assert_eq!(partitions[0], partitions[1]);
    assert!(!partitions[0].contains("rows"));
}

struct Budget {
    remaining: usize,
    answered: usize,
}

impl ReleaseLedger for Budget {
    fn before_release(&mut self) -> Result<(), ValidationError> {
        if self.remaining == 0 {
            return Err(ValidationError::QueryRefused("budget spent".to_string()));
        }
        self.remaining -= 1;
        Ok(())
    }

    fn after_release(&mut self, _: &Release) {
        self.answered += 1;
    }
}

#[test]
fn experiment_queries_go_through_the_ledger() {
    let mut experiment = Experiment::new(synthetic_dataset(500, 6), 4, 5).unwrap();
    let result = experiment
        .cross_validate("logistic", &LogisticRegression::default())
        .unwrap();
    let params = ThresholdoutParams::new(0.04, 0.01, 1).unwrap();
    let mut ledger = Budget {
        remaining: 1,
        answered: 0,
    };

    experiment
        .thresholdout_with_ledger(&result.final_estimate, &params, &mut ledger)
        .unwrap();
    assert!(matches!(
        experiment.thresholdout_with_ledger(&result.final_estimate, &params, &mut ledger),
        Err(ValidationError::QueryRefused(_))
    ));
    assert_eq!(ledger.answered, 1);
}
