//! # Fold Replicator
//!
//! Derives the `K` train/test role assignments of K-fold cross-validation from
//! a `CvPartition`. A replicate stores only its index and a borrow of the
//! partition; train and test row lists are materialised on demand, so there
//! are never `K` physical copies of the data. Nothing here draws randomness.
//!
//! Row lists are crate-internal: taken over every replicate they spell out the
//! cross-validation rows, and thereby the holdout.

use crate::partition::CvPartition;

/// Role of a cross-validation row within one replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Train,
    Test,
}

/// One `(row, replicate, role)` triple of the index-based view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledRow {
    pub row: usize,
    pub replicate: usize,
    pub role: Role,
}

/// Replicate `r` labels the rows of fold `r` as test and every other
/// cross-validation row as train.
#[derive(Debug, Clone, Copy)]
pub struct Replicate<'a> {
    index: usize,
    partition: &'a CvPartition,
}

/// Builds replicates `1..=K` over `partition`.
pub fn replicate(partition: &CvPartition) -> Vec<Replicate<'_>> {
    (1..=partition.k())
        .map(|index| Replicate { index, partition })
        .collect()
}

impl<'a> Replicate<'a> {
    /// Replicate index in `1..=K`; equals the fold that is held out as test.
    pub fn index(&self) -> usize {
        self.index
    }

    fn role_of_fold(&self, fold: usize) -> Role {
        if fold == self.index {
            Role::Test
        } else {
            Role::Train
        }
    }

    /// Every cross-validation row exactly once, in dataset order.
    pub(crate) fn labeled_rows(self) -> impl Iterator<Item = LabeledRow> + 'a {
        let partition: &'a CvPartition = self.partition;
        partition
            .rows()
            .iter()
            .zip(partition.folds())
            .map(move |(&row, &fold)| LabeledRow {
                row,
                replicate: self.index,
                role: self.role_of_fold(fold),
            })
    }

    /// Rows with the given role, in dataset order.
    pub(crate) fn rows_with(&self, role: Role) -> Vec<usize> {
        self.labeled_rows()
            .filter(|labeled| labeled.role == role)
            .map(|labeled| labeled.row)
            .collect()
    }

    pub(crate) fn train_rows(&self) -> Vec<usize> {
        self.rows_with(Role::Train)
    }

    pub(crate) fn test_rows(&self) -> Vec<usize> {
        self.rows_with(Role::Test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::split;
    use itertools::Itertools;

    #[test]
    fn produces_k_replicates_in_order() {
        let (cv, _) = split(100, 4, 3).unwrap();
        let replicates = replicate(&cv);
        assert_eq!(
            replicates.iter().map(Replicate::index).collect_vec(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn each_replicate_tests_exactly_its_own_fold() {
        let (cv, _) = split(400, 5, 11).unwrap();
        for rep in replicate(&cv) {
            let labeled = rep.labeled_rows().collect_vec();
            assert_eq!(labeled.len(), cv.len());
            assert!(labeled.iter().map(|l| l.row).eq(cv.rows().iter().copied()));

            for (l, &fold) in labeled.iter().zip(cv.folds()) {
                assert_eq!(l.replicate, rep.index());
                let expected = if fold == rep.index() {
                    Role::Test
                } else {
                    Role::Train
                };
                assert_eq!(l.role, expected);
            }

            assert_eq!(rep.test_rows().len(), cv.fold_sizes()[rep.index() - 1]);
            assert_eq!(rep.train_rows().len() + rep.test_rows().len(), cv.len());
        }
    }

    #[test]
    fn every_row_is_tested_exactly_once_across_replicates() {
        let (cv, _) = split(250, 3, 5).unwrap();
        let tested = replicate(&cv)
            .iter()
            .flat_map(Replicate::test_rows)
            .sorted()
            .collect_vec();
        assert_eq!(tested, cv.rows().to_vec());
    }

    #[test]
    fn row_lists_preserve_dataset_order() {
        let (cv, _) = split(300, 4, 8).unwrap();
        for rep in replicate(&cv) {
            let train = rep.train_rows();
            assert!(train.windows(2).all(|w| w[0] < w[1]));
            let test = rep.test_rows();
            assert!(test.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
