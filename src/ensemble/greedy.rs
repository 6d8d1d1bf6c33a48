//! Greedy ensemble selection
//!
//! Caruana-style forward selection with replacement: at every round the
//! member whose addition gives the best score of the averaged prediction is
//! added to the bag. Final weights are selection counts over the bag size.

use super::oof::StackedOof;
use crate::data::TaskType;
use crate::error::{KolosalError, Result};
use crate::metrics::{unique_classes, Predictions, Scorer};
use crate::model::Estimator;
use ndarray::{s, Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use tracing::debug;

/// Weighted combination of a fixed list of estimators
pub struct GreedyEnsemble {
    task: TaskType,
    estimators: Vec<Box<dyn Estimator>>,
    scorer: Scorer,
    ensemble_size: usize,
    classes: Option<Vec<f64>>,
    weights: Option<Vec<f64>>,
    best_stack: Vec<usize>,
    scores: Vec<f64>,
}

impl GreedyEnsemble {
    /// Create an unfitted ensemble over `estimators`
    pub fn new(
        task: TaskType,
        estimators: Vec<Box<dyn Estimator>>,
        scorer: Scorer,
        ensemble_size: usize,
    ) -> Self {
        Self {
            task,
            estimators,
            scorer,
            ensemble_size: ensemble_size.max(1),
            classes: None,
            weights: None,
            best_stack: Vec::new(),
            scores: Vec::new(),
        }
    }

    /// Fit member weights.
    ///
    /// With `oof` the stacked out-of-fold predictions are used as member
    /// predictions and `x` is ignored; otherwise every member predicts `x`.
    pub fn fit(&mut self, x: Option<&DataFrame>, y: &Array1<f64>, oof: Option<&StackedOof>) -> Result<()> {
        if self.estimators.is_empty() {
            return Err(KolosalError::InvalidInput("ensemble has no estimators".to_string()));
        }

        let classes = if self.task.is_classification() {
            Some(
                self.estimators[0]
                    .classes()
                    .map(|c| c.to_vec())
                    .unwrap_or_else(|| unique_classes(y)),
            )
        } else {
            None
        };
        self.classes = classes;

        let member_preds = match (oof, x) {
            (Some(oof), _) => self.oof_member_predictions(oof)?,
            (None, Some(x)) => self.member_predictions(x)?,
            (None, None) => {
                return Err(KolosalError::InvalidInput(
                    "ensemble fit needs either eval data or out-of-fold predictions".to_string(),
                ))
            }
        };

        for (i, pred) in member_preds.iter().enumerate() {
            if pred.nrows() != y.len() {
                return Err(KolosalError::AlignmentError(format!(
                    "member {} produced {} predictions for {} labels",
                    i,
                    pred.nrows(),
                    y.len()
                )));
            }
        }

        let k = member_preds.len();
        let mut sum = Array2::<f64>::zeros(member_preds[0].raw_dim());
        let mut counts = vec![0usize; k];
        self.best_stack.clear();
        self.scores.clear();

        for round in 0..self.ensemble_size {
            let mut best: Option<(usize, f64)> = None;
            for (j, pred) in member_preds.iter().enumerate() {
                let candidate = (&sum + pred) / (round + 1) as f64;
                let score = self.score_matrix(y, candidate)?;
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((j, score));
                }
            }
            // member_preds is non-empty, so a best member always exists
            if let Some((j, score)) = best {
                sum += &member_preds[j];
                counts[j] += 1;
                self.best_stack.push(j);
                self.scores.push(score);
            }
        }

        let weights: Vec<f64> = counts
            .iter()
            .map(|&c| c as f64 / self.ensemble_size as f64)
            .collect();
        debug!(weights = ?weights, scores = ?self.scores, "fitted greedy ensemble");
        self.weights = Some(weights);
        Ok(())
    }

    /// Member weights after fitting
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Member index chosen at each greedy round
    pub fn best_stack(&self) -> &[usize] {
        &self.best_stack
    }

    /// Ensemble score after each greedy round
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn n_estimators(&self) -> usize {
        self.estimators.len()
    }

    fn fitted_weights(&self) -> Result<&[f64]> {
        self.weights
            .as_deref()
            .ok_or_else(|| KolosalError::not_fitted("greedy_ensemble"))
    }

    fn score_matrix(&self, y: &Array1<f64>, combined: Array2<f64>) -> Result<f64> {
        let predictions = match &self.classes {
            Some(classes) => Predictions::Probabilities {
                proba: combined,
                classes: classes.clone(),
            },
            None => Predictions::Values(combined.column(0).to_owned()),
        };
        self.scorer.score(y, &predictions)
    }

    fn member_predictions(&self, x: &DataFrame) -> Result<Vec<Array2<f64>>> {
        let classification = self.task.is_classification();
        self.estimators
            .par_iter()
            .map(|est| {
                if classification {
                    est.predict_proba(x)
                } else {
                    Ok(est.predict(x)?.insert_axis(Axis(1)))
                }
            })
            .collect()
    }

    fn oof_member_predictions(&self, oof: &StackedOof) -> Result<Vec<Array2<f64>>> {
        if oof.n_estimators() != self.estimators.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("OOF for {} estimators", self.estimators.len()),
                actual: format!("{:?}", oof.shape()),
            });
        }

        let n_classes = self.classes.as_ref().map(|c| c.len());
        (0..self.estimators.len())
            .map(|i| match (oof, n_classes) {
                (StackedOof::Single(a), None) => Ok(a.column(i).to_owned().insert_axis(Axis(1))),
                (StackedOof::Single(a), Some(2)) => {
                    let p = a.column(i);
                    let mut out = Array2::zeros((p.len(), 2));
                    out.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
                    out.column_mut(1).assign(&p);
                    Ok(out)
                }
                (StackedOof::Multi(a), Some(c)) if a.dim().2 == c => Ok(a.slice(s![.., i, ..]).to_owned()),
                _ => Err(KolosalError::ShapeError {
                    expected: format!("OOF compatible with {:?} classes", n_classes),
                    actual: format!("{:?}", oof.shape()),
                }),
            })
            .collect()
    }
}

impl Estimator for GreedyEnsemble {
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let weights = self.fitted_weights()?;
        match &self.classes {
            Some(classes) => {
                let proba = self.predict_proba(x)?;
                Ok(Predictions::Probabilities {
                    proba,
                    classes: classes.clone(),
                }
                .to_labels())
            }
            None => {
                let mut total: Option<Array1<f64>> = None;
                for (est, &w) in self.estimators.iter().zip(weights) {
                    if w == 0.0 {
                        continue;
                    }
                    let pred = est.predict(x)? * w;
                    total = Some(match total {
                        Some(t) => t + pred,
                        None => pred,
                    });
                }
                total.ok_or_else(|| KolosalError::not_fitted("greedy_ensemble"))
            }
        }
    }

    fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let weights = self.fitted_weights()?;
        let classes = self.classes.as_ref().ok_or_else(|| {
            KolosalError::InvalidInput("regression ensemble has no class probabilities".to_string())
        })?;

        let mut total = Array2::<f64>::zeros((x.height(), classes.len()));
        for (est, &w) in self.estimators.iter().zip(weights) {
            if w == 0.0 {
                continue;
            }
            let proba = est.predict_proba(x)?;
            if proba.dim() != total.dim() {
                return Err(KolosalError::ShapeError {
                    expected: format!("{:?}", total.dim()),
                    actual: format!("{:?}", proba.dim()),
                });
            }
            total.scaled_add(w, &proba);
        }
        Ok(total)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.classes.as_deref()
    }

    fn name(&self) -> &str {
        "greedy_ensemble"
    }

    fn ensemble_weights(&self) -> Option<Vec<f64>> {
        self.weights.clone()
    }
}
