//! Scorer definitions

use super::{class_indices, Predictions};
use crate::data::TaskType;
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-15;

/// Scoring function; larger values are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    NegLogLoss,
    Accuracy,
    RocAuc,
    NegMeanSquaredError,
    NegMeanAbsoluteError,
    R2,
}

impl Scorer {
    /// Default scorer for a task
    pub fn default_for(task: TaskType) -> Self {
        if task.is_classification() {
            Scorer::NegLogLoss
        } else {
            Scorer::NegMeanSquaredError
        }
    }

    /// Whether the scorer needs class probabilities
    pub fn needs_proba(&self) -> bool {
        matches!(self, Scorer::NegLogLoss | Scorer::RocAuc)
    }

    /// Whether the scorer applies to a task
    pub fn supports(&self, task: TaskType) -> bool {
        match self {
            Scorer::NegLogLoss | Scorer::Accuracy => task.is_classification(),
            Scorer::RocAuc => task == TaskType::Binary,
            Scorer::NegMeanSquaredError | Scorer::NegMeanAbsoluteError | Scorer::R2 => {
                task == TaskType::Regression
            }
        }
    }

    /// Score predictions against true labels
    pub fn score(&self, y_true: &Array1<f64>, predictions: &Predictions) -> Result<f64> {
        if y_true.len() != predictions.len() {
            return Err(KolosalError::AlignmentError(format!(
                "{} labels scored against {} predictions",
                y_true.len(),
                predictions.len()
            )));
        }
        if y_true.is_empty() {
            return Err(KolosalError::InvalidInput("cannot score empty labels".to_string()));
        }

        match (self, predictions) {
            (Scorer::NegLogLoss, Predictions::Probabilities { proba, classes }) => {
                Ok(-log_loss(&class_indices(y_true, classes)?, proba))
            }
            (Scorer::RocAuc, Predictions::Probabilities { proba, classes }) => {
                if classes.len() != 2 {
                    return Err(KolosalError::InvalidInput(format!(
                        "roc_auc needs 2 classes, got {}",
                        classes.len()
                    )));
                }
                let positive: Vec<bool> = class_indices(y_true, classes)?
                    .into_iter()
                    .map(|i| i == 1)
                    .collect();
                Ok(roc_auc(&positive, &proba.column(1).to_vec()))
            }
            (Scorer::NegLogLoss | Scorer::RocAuc, Predictions::Values(_)) => Err(
                KolosalError::InvalidInput(format!("{:?} requires class probabilities", self)),
            ),
            (Scorer::Accuracy, preds) => Ok(accuracy(y_true, &preds.to_labels())),
            (Scorer::NegMeanSquaredError, preds) => Ok(-mean_squared_error(y_true, &preds.to_labels())),
            (Scorer::NegMeanAbsoluteError, preds) => Ok(-mean_absolute_error(y_true, &preds.to_labels())),
            (Scorer::R2, preds) => Ok(r2(y_true, &preds.to_labels())),
        }
    }
}

/// Multi-class log loss with clipped probabilities
pub fn log_loss(y_idx: &[usize], proba: &Array2<f64>) -> f64 {
    let total: f64 = y_idx
        .iter()
        .zip(proba.rows())
        .map(|(&k, row)| {
            let norm: f64 = row.sum().max(EPS);
            -(row[k] / norm).clamp(EPS, 1.0 - EPS).ln()
        })
        .sum();
    total / y_idx.len() as f64
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Area under the ROC curve via the rank statistic (ties get average rank)
pub fn roc_auc(positive: &[bool], scores: &[f64]) -> f64 {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = positive
        .iter()
        .zip(ranks.iter())
        .filter(|(&p, _)| p)
        .map(|(_, r)| r)
        .sum();
    (rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0) / (n_pos * n_neg) as f64
}
