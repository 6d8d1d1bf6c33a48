//! Train/eval splitting

use super::frame::{take_labels, take_rows};
use crate::error::{KolosalError, Result};
use ndarray::Array1;
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Output of a split: `(X_train, X_eval, y_train, y_eval)`
pub type SplitParts = (DataFrame, DataFrame, Array1<f64>, Array1<f64>);

/// Split rows into a train and an eval partition.
///
/// With `stratify` the class proportions of the given labels are kept in both
/// partitions; every class with at least two rows lands on both sides.
pub fn train_test_split(
    x: &DataFrame,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
    stratify: Option<&Array1<f64>>,
) -> Result<SplitParts> {
    let (train_idx, test_idx) = split_indices(y.len(), test_size, seed, stratify)?;
    if x.height() != y.len() {
        return Err(KolosalError::AlignmentError(format!(
            "cannot split {} rows with {} labels",
            x.height(),
            y.len()
        )));
    }

    Ok((
        take_rows(x, &train_idx)?,
        take_rows(x, &test_idx)?,
        take_labels(y, &train_idx),
        take_labels(y, &test_idx),
    ))
}

/// Compute shuffled train/test row positions
pub fn split_indices(
    n_samples: usize,
    test_size: f64,
    seed: u64,
    stratify: Option<&Array1<f64>>,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(KolosalError::InvalidInput(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n_samples < 2 {
        return Err(KolosalError::InvalidInput(format!(
            "need at least 2 samples to split, got {}",
            n_samples
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let (mut train, mut test) = match stratify {
        None => {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(&mut rng);
            let n_test = n_test_rows(n_samples, test_size);
            let train = indices.split_off(n_test);
            (train, indices)
        }
        Some(labels) => {
            if labels.len() != n_samples {
                return Err(KolosalError::AlignmentError(format!(
                    "stratify labels have {} entries for {} samples",
                    labels.len(),
                    n_samples
                )));
            }

            // BTreeMap keeps class iteration order deterministic
            let mut by_class: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
            for (i, &label) in labels.iter().enumerate() {
                by_class.entry(label.to_bits()).or_default().push(i);
            }

            let mut train = Vec::with_capacity(n_samples);
            let mut test = Vec::new();
            for (_, mut members) in by_class {
                members.shuffle(&mut rng);
                let n_test = if members.len() < 2 {
                    0
                } else {
                    n_test_rows(members.len(), test_size)
                };
                let rest = members.split_off(n_test);
                test.extend(members);
                train.extend(rest);
            }
            (train, test)
        }
    };

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test))
}

// At least one row on each side.
pub(crate) fn n_test_rows(n: usize, test_size: f64) -> usize {
    ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_random_split_sizes() {
        let (train, test) = split_indices(100, 0.3, 7, None).unwrap();
        assert_eq!(test.len(), 30);
        assert_eq!(train.len(), 70);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic_for_seed() {
        let a = split_indices(50, 0.2, 42, None).unwrap();
        let b = split_indices(50, 0.2, 42, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stratified_split_keeps_proportions() {
        let labels: Array1<f64> = (0..100).map(|i| if i < 80 { 0.0 } else { 1.0 }).collect();
        let (_, test) = split_indices(100, 0.25, 1, Some(&labels)).unwrap();

        let positives = test.iter().filter(|&&i| labels[i] == 1.0).count();
        assert_eq!(positives, 5);
        assert_eq!(test.len() - positives, 20);
    }

    #[test]
    fn test_train_test_split_frames() {
        let x = df!("a" => (0..10).map(|v| v as f64).collect::<Vec<_>>()).unwrap();
        let y: Array1<f64> = (0..10).map(|v| (v % 2) as f64).collect();

        let (x_tr, x_ev, y_tr, y_ev) = train_test_split(&x, &y, 0.3, 3, Some(&y)).unwrap();
        assert_eq!(x_tr.height(), y_tr.len());
        assert_eq!(x_ev.height(), y_ev.len());
        assert_eq!(x_tr.height() + x_ev.height(), 10);
    }

    #[test]
    fn test_invalid_test_size() {
        assert!(split_indices(10, 0.0, 1, None).is_err());
        assert!(split_indices(10, 1.0, 1, None).is_err());
    }
}
