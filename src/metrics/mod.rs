//! Evaluation metrics and scorers
//!
//! Scorers follow the "greater is better" convention so that rewards,
//! greedy ensembling and permutation importance can compare them directly.

mod scorer;

pub use scorer::Scorer;

use crate::data::TaskType;
use crate::error::{KolosalError, Result};
use crate::model::Estimator;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;

/// Model output handed to a scorer
#[derive(Debug, Clone)]
pub enum Predictions {
    /// Point predictions (regression values or class labels)
    Values(Array1<f64>),
    /// Class probabilities, columns ordered like `classes`
    Probabilities {
        proba: Array2<f64>,
        classes: Vec<f64>,
    },
}

impl Predictions {
    /// Point predictions; probabilities collapse to the most likely class
    pub fn to_labels(&self) -> Array1<f64> {
        match self {
            Predictions::Values(v) => v.clone(),
            Predictions::Probabilities { proba, classes } => proba
                .rows()
                .into_iter()
                .map(|row| classes[argmax(row.iter().copied())])
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Predictions::Values(v) => v.len(),
            Predictions::Probabilities { proba, .. } => proba.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position of the largest value; first one wins ties
pub fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Map labels to class positions
pub fn class_indices(y: &Array1<f64>, classes: &[f64]) -> Result<Vec<usize>> {
    y.iter()
        .map(|label| {
            classes
                .iter()
                .position(|c| c == label)
                .ok_or_else(|| KolosalError::InvalidInput(format!("label {} not among classes {:?}", label, classes)))
        })
        .collect()
}

/// Sorted distinct labels
pub fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().filter(|v| !v.is_nan()).collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

/// Predict `x` with an estimator in the form the task is scored in
pub fn predict_for_scoring(
    estimator: &dyn Estimator,
    x: &DataFrame,
    y: &Array1<f64>,
    task: TaskType,
) -> Result<Predictions> {
    if task.is_classification() {
        let proba = estimator.predict_proba(x)?;
        let classes = estimator
            .classes()
            .map(|c| c.to_vec())
            .unwrap_or_else(|| unique_classes(y));
        if proba.ncols() != classes.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} probability columns", classes.len()),
                actual: format!("{}", proba.ncols()),
            });
        }
        Ok(Predictions::Probabilities { proba, classes })
    } else {
        Ok(Predictions::Values(estimator.predict(x)?))
    }
}

/// Score an estimator on labeled data.
///
/// Label scorers use `predict` directly, so estimators without class
/// probabilities can still be scored by accuracy.
pub fn evaluate(
    estimator: &dyn Estimator,
    x: &DataFrame,
    y: &Array1<f64>,
    scorer: Scorer,
    task: TaskType,
) -> Result<f64> {
    let predictions = if scorer.needs_proba() {
        predict_for_scoring(estimator, x, y, task)?
    } else {
        Predictions::Values(estimator.predict(x)?)
    };
    scorer.score(y, &predictions)
}
