//! # Dataset Module
//!
//! The labeled dataset every other component reads from, the borrowed row
//! views handed to the model collaborator, and the TSV loader used by the
//! command-line front end.
//!
//! - Immutable Input: a `Dataset` is validated once on construction and never
//!   mutated afterwards. Partitions and replicates refer to its rows by index.
//! - Binary Labels: labels must be exactly `0` or `1`; misclassification is
//!   scored against them with a 0/1 loss.
//! - Loading: the loader uses `polars` to read a tab-separated file with a
//!   header row. The label column is named by the caller; feature columns are
//!   either named explicitly or default to every other column.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, ShapeBuilder};
use polars::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Column that is never treated as a feature when features are inferred.
const SAMPLE_ID_COLUMN: &str = "sample_id";

/// An ordered collection of rows, each with feature values and one binary label.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<f64>,
    feature_names: Vec<String>,
}

/// A comprehensive error type for dataset construction, loading and
/// partition-integrity failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),

    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },

    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),

    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),

    #[error("Label at row {row} is {value}, but labels must be exactly 0 or 1.")]
    NonBinaryLabel { row: usize, value: f64 },

    #[error("The feature matrix has {rows} rows but {labels} labels were supplied.")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("The feature matrix has {columns} columns but {names} feature names were supplied.")]
    FeatureNameMismatch { columns: usize, names: usize },

    #[error("No feature columns remain after removing the label column '{0}'.")]
    NoFeatureColumns(String),

    #[error("The input file contains no data rows.")]
    EmptyDataset,

    #[error("The holdout set is empty; at least one holdout row is required to score a query.")]
    EmptyHoldout,

    #[error("Replicate {replicate} has no training rows, so no model can be fitted.")]
    EmptyTrainingSet { replicate: usize },

    #[error("The cross-validation partition is empty, so the final model cannot be fitted.")]
    EmptyCvPartition,

    #[error("The partition covers {partition_rows} rows but the dataset has {dataset_rows}.")]
    PartitionSizeMismatch {
        partition_rows: usize,
        dataset_rows: usize,
    },

    #[error("Row {row} is outside a dataset of {n_rows} rows.")]
    RowOutOfRange { row: usize, n_rows: usize },

    #[error("Row {0} appears in more than one partition block.")]
    PartitionOverlap(usize),

    #[error("Row {0} is not covered by any partition block.")]
    PartitionIncomplete(usize),
}

impl Dataset {
    /// Builds a dataset from a `[n_rows, n_features]` matrix and a label vector.
    ///
    /// Every feature value must be finite and every label must be `0.0` or `1.0`.
    /// An empty dataset is permitted; the partitioner maps it to empty folds.
    pub fn new(
        features: Array2<f64>,
        labels: Array1<f64>,
        feature_names: Vec<String>,
    ) -> Result<Self, DataError> {
        if features.nrows() != labels.len() {
            return Err(DataError::LabelCountMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(DataError::FeatureNameMismatch {
                columns: features.ncols(),
                names: feature_names.len(),
            });
        }
        for (name, column) in feature_names.iter().zip(features.axis_iter(Axis(1))) {
            if column.iter().any(|v| !v.is_finite()) {
                return Err(DataError::NonFiniteValuesFound(name.clone()));
            }
        }
        for (row, &value) in labels.iter().enumerate() {
            if value != 0.0 && value != 1.0 {
                return Err(DataError::NonBinaryLabel { row, value });
            }
        }

        Ok(Self {
            features,
            labels,
            feature_names,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, f64> {
        self.labels.view()
    }

    /// Borrows the given rows, in the given order, as a view for the model collaborator.
    pub fn view<'a>(&'a self, rows: &'a [usize]) -> RowView<'a> {
        RowView {
            dataset: self,
            rows,
        }
    }
}

/// An ordered subset of a dataset's rows, with features and labels.
///
/// This is what a `Classifier` trains on. Row order is preserved exactly as
/// given, and row indices are never exposed.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    dataset: &'a Dataset,
    rows: &'a [usize],
}

impl fmt::Debug for RowView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowView")
            .field("len", &self.rows.len())
            .field("n_features", &self.dataset.n_features())
            .finish_non_exhaustive()
    }
}

impl<'a> RowView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.dataset.n_features()
    }

    pub fn feature_names(&self) -> &'a [String] {
        &self.dataset.feature_names
    }

    /// Gathers the feature rows of this view into a `[len, n_features]` matrix.
    pub fn features(&self) -> Array2<f64> {
        self.dataset.features.select(Axis(0), self.rows)
    }

    /// Gathers the labels of this view.
    pub fn labels(&self) -> Array1<f64> {
        self.dataset.labels.select(Axis(0), self.rows)
    }

    /// The same rows with the labels withheld.
    pub fn without_labels(&self) -> FeatureView<'a> {
        FeatureView {
            dataset: self.dataset,
            rows: self.rows,
        }
    }
}

/// The rows a `Predictor` scores: features only.
///
/// The `i`-th probability a predictor returns lines up with the `i`-th row of
/// `features()`. Labels are not reachable from here, so a predictor cannot
/// observe the outcomes of the rows it is asked to score.
///
/// ```compile_fail
/// fn peek(view: &holdout::data::FeatureView<'_>) {
///     let _ = view.labels();
/// }
/// ```
#[derive(Clone, Copy)]
pub struct FeatureView<'a> {
    dataset: &'a Dataset,
    rows: &'a [usize],
}

impl fmt::Debug for FeatureView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureView")
            .field("len", &self.rows.len())
            .field("n_features", &self.dataset.n_features())
            .finish_non_exhaustive()
    }
}

impl<'a> FeatureView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.dataset.n_features()
    }

    pub fn feature_names(&self) -> &'a [String] {
        &self.dataset.feature_names
    }

    /// Gathers the feature rows of this view into a `[len, n_features]` matrix.
    pub fn features(&self) -> Array2<f64> {
        self.dataset.features.select(Axis(0), self.rows)
    }
}

/// Loads a labeled dataset from a tab-separated file with a header row.
///
/// `feature_columns` fixes the feature order; when `None`, every column other
/// than `label_column` (and an optional `sample_id` column) is used, in file order.
pub fn load_dataset(
    path: &str,
    label_column: &str,
    feature_columns: Option<&[String]>,
) -> Result<Dataset, DataError> {
    fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        if casted.null_count() > 0 {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }

    log::info!("Loading dataset from '{path}'");

    let df = CsvReader::new(File::open(Path::new(path))?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyDataset);
    }

    let file_columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let columns_set: HashSet<&str> = file_columns.iter().map(String::as_str).collect();

    if !columns_set.contains(label_column) {
        return Err(DataError::ColumnNotFound(label_column.to_string()));
    }

    let feature_names: Vec<String> = match feature_columns {
        Some(requested) => {
            for name in requested {
                if !columns_set.contains(name.as_str()) {
                    return Err(DataError::ColumnNotFound(name.clone()));
                }
            }
            requested.to_vec()
        }
        None => file_columns
            .iter()
            .filter(|name| name.as_str() != label_column && name.as_str() != SAMPLE_ID_COLUMN)
            .cloned()
            .collect(),
    };
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns(label_column.to_string()));
    }

    let labels = Array1::from_vec(extract_numeric_column(&df, label_column)?);
    let n_rows = labels.len();

    let mut buffer = Vec::with_capacity(n_rows * feature_names.len());
    for name in &feature_names {
        let mut column = extract_numeric_column(&df, name)?;
        buffer.append(&mut column);
    }
    let features = Array2::from_shape_vec((n_rows, feature_names.len()).f(), buffer).map_err(
        |_| DataError::FeatureNameMismatch {
            columns: 0,
            names: feature_names.len(),
        },
    )?;

    log::info!(
        "Loaded {} rows with label '{}' and {} feature columns",
        n_rows,
        label_column,
        feature_names.len()
    );

    Dataset::new(features, labels, feature_names)
}
