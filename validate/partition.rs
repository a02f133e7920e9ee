//! # Partitioner
//!
//! Splits the rows of a dataset into `K + 1` disjoint folds with one seeded
//! uniform draw per row. Folds `1..=K` form the cross-validation partition;
//! fold `K + 1` becomes the holdout set, which is sealed on creation and only
//! readable by the thresholdout mechanism.
//!
//! The generator is an explicit argument. `split` seeds a `StdRng` from an
//! integer; `split_with_rng` accepts any generator the caller wants to thread
//! through. Identical seed, row count and `K` reproduce the split bit-for-bit.
//!
//! Outside the crate a partition reveals counts only. Row membership stays
//! internal, since the cross-validation rows and the row count together would
//! identify the holdout rows.
//!
//! ```compile_fail
//! let (cv, _) = holdout::partition::split(60, 3, 9).unwrap();
//! let _ = cv.rows();
//! ```

use crate::error::ConfigurationError;
use crate::thresholdout::HoldoutSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// A total map from row index to fold id in `1..=K+1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FoldAssignment {
    k: usize,
    folds: Vec<usize>,
}

/// The non-holdout rows (folds `1..=K`) together with their fold ids, in dataset order.
#[derive(Clone, PartialEq, Eq)]
pub struct CvPartition {
    k: usize,
    n_rows: usize,
    rows: Vec<usize>,
    folds: Vec<usize>,
}

/// Maps a draw `u` in `[0, 1)` to the fold whose interval `((i-1)/(K+1), i/(K+1)]`
/// contains it. `u = 0` belongs to fold 1.
fn fold_for_draw(u: f64, n_folds: usize) -> usize {
    let scaled = (u * n_folds as f64).ceil() as usize;
    scaled.clamp(1, n_folds)
}

/// Draws a fold id for each of `n_rows` rows, in row order.
pub(crate) fn assign_folds<R: Rng + ?Sized>(
    n_rows: usize,
    k: usize,
    rng: &mut R,
) -> Result<FoldAssignment, ConfigurationError> {
    if k < 1 {
        return Err(ConfigurationError::InvalidFoldCount(k));
    }
    let n_folds = k + 1;
    let folds = (0..n_rows)
        .map(|_| fold_for_draw(rng.random::<f64>(), n_folds))
        .collect();
    Ok(FoldAssignment { k, folds })
}

impl FoldAssignment {
    /// Row counts for folds `1..=K+1`.
    fn fold_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k + 1];
        for &fold in &self.folds {
            sizes[fold - 1] += 1;
        }
        sizes
    }

    /// Separates the cross-validation folds from the holdout fold.
    fn into_partition(self) -> (CvPartition, HoldoutSet) {
        let holdout_fold = self.k + 1;
        let n_rows = self.folds.len();
        let mut rows = Vec::with_capacity(n_rows);
        let mut folds = Vec::with_capacity(n_rows);
        let mut holdout_rows = Vec::new();
        for (row, fold) in self.folds.into_iter().enumerate() {
            if fold == holdout_fold {
                holdout_rows.push(row);
            } else {
                rows.push(row);
                folds.push(fold);
            }
        }
        (
            CvPartition {
                k: self.k,
                n_rows,
                rows,
                folds,
            },
            HoldoutSet::seal(holdout_rows),
        )
    }
}

impl fmt::Debug for CvPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CvPartition")
            .field("k", &self.k)
            .field("len", &self.rows.len())
            .field("fold_sizes", &self.fold_sizes())
            .finish_non_exhaustive()
    }
}

impl CvPartition {
    pub fn k(&self) -> usize {
        self.k
    }

    /// Size of the dataset this partition was drawn for, holdout rows included.
    pub(crate) fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of cross-validation rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cross-validation row indices, ascending.
    pub(crate) fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Fold ids parallel to `rows()`.
    pub(crate) fn folds(&self) -> &[usize] {
        &self.folds
    }

    /// Row counts for folds `1..=K`.
    pub fn fold_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &fold in &self.folds {
            sizes[fold - 1] += 1;
        }
        sizes
    }
}

/// Splits `n_rows` rows into a cross-validation partition and a sealed holdout set.
pub fn split(
    n_rows: usize,
    k: usize,
    seed: u64,
) -> Result<(CvPartition, HoldoutSet), ConfigurationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    split_with_rng(n_rows, k, &mut rng)
}

/// As `split`, drawing from a caller-supplied generator.
pub fn split_with_rng<R: Rng + ?Sized>(
    n_rows: usize,
    k: usize,
    rng: &mut R,
) -> Result<(CvPartition, HoldoutSet), ConfigurationError> {
    let assignment = assign_folds(n_rows, k, rng)?;
    log::debug!("Fold sizes (holdout last): {:?}", assignment.fold_sizes());
    Ok(assignment.into_partition())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn draws_map_to_half_open_intervals() {
        // K = 3, so four folds with upper bounds 0.25, 0.5, 0.75, 1.0.
        assert_eq!(fold_for_draw(0.0, 4), 1);
        assert_eq!(fold_for_draw(0.1, 4), 1);
        assert_eq!(fold_for_draw(0.25, 4), 1);
        assert_eq!(fold_for_draw(0.2500001, 4), 2);
        assert_eq!(fold_for_draw(0.5, 4), 2);
        assert_eq!(fold_for_draw(0.74, 4), 3);
        assert_eq!(fold_for_draw(0.9999999, 4), 4);
    }

    #[test]
    fn zero_folds_is_a_configuration_error() {
        assert!(matches!(
            split(10, 0, 1),
            Err(ConfigurationError::InvalidFoldCount(0))
        ));
    }

    #[test]
    fn empty_dataset_yields_empty_partitions() {
        let (cv, holdout) = split(0, 5, 1).unwrap();
        assert!(cv.is_empty());
        assert!(holdout.is_empty());
        assert_eq!(cv.fold_sizes(), vec![0; 5]);
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        for k in 1..=6 {
            for n in [1_usize, 7, 50, 333] {
                let (cv, holdout) = split(n, k, 99 + k as u64).unwrap();
                let cv_rows: HashSet<usize> = cv.rows().iter().copied().collect();
                assert_eq!(cv_rows.len(), cv.len());
                assert_eq!(cv.len() + holdout.len(), n);
                assert!(cv.folds().iter().all(|&f| (1..=k).contains(&f)));
                holdout.check_partition(&cv).unwrap();
            }
        }
    }

    #[test]
    fn identical_seed_reproduces_assignment() {
        let mut first = StdRng::seed_from_u64(1);
        let mut second = StdRng::seed_from_u64(1);
        let a = assign_folds(1200, 5, &mut first).unwrap();
        let b = assign_folds(1200, 5, &mut second).unwrap();
        assert_eq!(a, b);

        let mut other = StdRng::seed_from_u64(2);
        let c = assign_folds(1200, 5, &mut other).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn twelve_hundred_rows_give_six_folds_of_about_two_hundred() {
        let mut rng = StdRng::seed_from_u64(1);
        let assignment = assign_folds(1200, 5, &mut rng).unwrap();
        let sizes = assignment.fold_sizes();
        assert_eq!(sizes.len(), 6);
        assert_eq!(sizes.iter().sum::<usize>(), 1200);
        for size in sizes {
            // Binomial(1200, 1/6) has sd ~12.9; five sd either side.
            assert!((135..=265).contains(&size), "fold size {size} too far from 200");
        }
    }

    #[test]
    fn into_partition_keeps_cv_fold_ids_and_sizes() {
        let mut rng = StdRng::seed_from_u64(7);
        let assignment = assign_folds(500, 4, &mut rng).unwrap();
        let sizes = assignment.fold_sizes();
        let expected = assignment.clone();
        let (cv, holdout) = assignment.into_partition();
        assert_eq!(holdout.len(), sizes[4]);
        assert_eq!(cv.fold_sizes(), sizes[..4].to_vec());
        for (&row, &fold) in cv.rows().iter().zip(cv.folds()) {
            assert_eq!(expected.folds[row], fold);
        }
    }

    #[test]
    fn debug_output_reports_counts_only() {
        let (cv, _) = split(60, 3, 9).unwrap();
        let rendered = format!("{cv:?}");
        let expected = format!(
            "CvPartition {{ k: 3, len: {}, fold_sizes: {:?}, .. }}",
            cv.len(),
            cv.fold_sizes()
        );
        assert_eq!(rendered, expected);
    }
}
