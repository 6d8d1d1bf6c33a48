//! Stacking of out-of-fold predictions

use crate::error::{KolosalError, Result};
use crate::search::{OutOfFold, Trial};
use ndarray::{s, Array2, Array3};

/// Out-of-fold predictions of K trials stacked along the second axis
#[derive(Debug, Clone, PartialEq)]
pub enum StackedOof {
    /// `(samples, K)` from one-dimensional OOF vectors
    Single(Array2<f64>),
    /// `(samples, K, classes)` from two-dimensional OOF matrices
    Multi(Array3<f64>),
}

impl StackedOof {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            StackedOof::Single(a) => a.shape().to_vec(),
            StackedOof::Multi(a) => a.shape().to_vec(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.shape()[0]
    }

    pub fn n_estimators(&self) -> usize {
        self.shape()[1]
    }
}

/// Stack the OOF predictions of `trials` in trial order.
///
/// Returns `Ok(None)` when no trial carries OOF predictions. When some do,
/// every trial must carry them with one common shape.
pub fn stack_oof(trials: &[&Trial]) -> Result<Option<StackedOof>> {
    let first = match trials.iter().find_map(|t| t.memo.oof.as_ref()) {
        Some(oof) => oof,
        None => return Ok(None),
    };

    let n_samples = first.n_samples();
    let k = trials.len();
    let mut stacked = match first.n_columns() {
        None => StackedOof::Single(Array2::zeros((n_samples, k))),
        Some(c) => StackedOof::Multi(Array3::zeros((n_samples, k, c))),
    };

    for (i, trial) in trials.iter().enumerate() {
        let oof = trial.memo.oof.as_ref().ok_or_else(|| {
            KolosalError::AlignmentError(format!(
                "trial {} has no out-of-fold predictions while other trials do",
                trial.trial_no
            ))
        })?;

        match (&mut stacked, oof) {
            (StackedOof::Single(out), OutOfFold::Vector(v)) if v.len() == n_samples => {
                out.column_mut(i).assign(v);
            }
            (StackedOof::Multi(out), OutOfFold::Matrix(m)) if m.dim() == (n_samples, out.dim().2) => {
                out.slice_mut(s![.., i, ..]).assign(m);
            }
            (out, oof) => {
                let expected = match out {
                    StackedOof::Single(_) => format!("({},)", n_samples),
                    StackedOof::Multi(a) => format!("({}, {})", n_samples, a.dim().2),
                };
                let actual = match oof {
                    OutOfFold::Vector(v) => format!("({},)", v.len()),
                    OutOfFold::Matrix(m) => format!("({}, {})", m.nrows(), m.ncols()),
                };
                return Err(KolosalError::ShapeError {
                    expected: format!("trial {} OOF of shape {}", trial.trial_no, expected),
                    actual,
                });
            }
        }
    }

    Ok(Some(stacked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn vec_trial(no: usize, values: Vec<f64>) -> Trial {
        Trial::new(no, 1.0, format!("m{}", no)).with_oof(OutOfFold::Vector(Array1::from(values)))
    }

    #[test]
    fn test_stack_vectors_shape() {
        let trials = vec![
            vec_trial(0, vec![0.1, 0.2, 0.3, 0.4]),
            vec_trial(1, vec![0.5, 0.6, 0.7, 0.8]),
            vec_trial(2, vec![0.9, 1.0, 1.1, 1.2]),
        ];
        let refs: Vec<&Trial> = trials.iter().collect();
        let stacked = stack_oof(&refs).unwrap().unwrap();

        assert_eq!(stacked.shape(), vec![4, 3]);
        match stacked {
            StackedOof::Single(a) => {
                assert_eq!(a[[0, 1]], 0.5);
                assert_eq!(a[[3, 2]], 1.2);
            }
            _ => panic!("expected single stack"),
        }
    }

    #[test]
    fn test_stack_matrices_shape() {
        let trials: Vec<Trial> = (0..2)
            .map(|i| {
                Trial::new(i, 1.0, "m").with_oof(OutOfFold::Matrix(array![
                    [0.2, 0.3, 0.5],
                    [0.1, 0.1, 0.8]
                ]))
            })
            .collect();
        let refs: Vec<&Trial> = trials.iter().collect();
        let stacked = stack_oof(&refs).unwrap().unwrap();

        assert_eq!(stacked.shape(), vec![2, 2, 3]);
        assert_eq!(stacked.n_estimators(), 2);
        match stacked {
            StackedOof::Multi(a) => assert_eq!(a[[1, 1, 2]], 0.8),
            _ => panic!("expected multi stack"),
        }
    }

    #[test]
    fn test_no_oof_is_none() {
        let trials = vec![Trial::new(0, 1.0, "m")];
        let refs: Vec<&Trial> = trials.iter().collect();
        assert!(stack_oof(&refs).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_lengths_fail() {
        let trials = vec![vec_trial(0, vec![0.1, 0.2]), vec_trial(1, vec![0.1])];
        let refs: Vec<&Trial> = trials.iter().collect();
        assert!(matches!(stack_oof(&refs), Err(KolosalError::ShapeError { .. })));
    }

    #[test]
    fn test_partial_oof_fails() {
        let trials = vec![vec_trial(0, vec![0.1, 0.2]), Trial::new(1, 0.5, "m1")];
        let refs: Vec<&Trial> = trials.iter().collect();
        assert!(matches!(stack_oof(&refs), Err(KolosalError::AlignmentError(_))));
    }
}
