//! Trial records kept by a search engine

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Out-of-fold predictions of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutOfFold {
    /// One value per sample (regression value or positive-class probability)
    Vector(Array1<f64>),
    /// One row of class probabilities per sample
    Matrix(Array2<f64>),
}

impl OutOfFold {
    pub fn n_samples(&self) -> usize {
        match self {
            OutOfFold::Vector(v) => v.len(),
            OutOfFold::Matrix(m) => m.nrows(),
        }
    }

    /// Trailing dimension: `None` for vectors, number of classes for matrices
    pub fn n_columns(&self) -> Option<usize> {
        match self {
            OutOfFold::Vector(_) => None,
            OutOfFold::Matrix(m) => Some(m.ncols()),
        }
    }
}

/// Extra payload attached to a trial
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialMemo {
    /// Present when the trial was evaluated with cross-validation
    pub oof: Option<OutOfFold>,
}

/// One evaluated configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_no: usize,
    /// Fitness under the experiment scorer; larger is better
    pub reward: f64,
    /// Handle of the persisted estimator
    pub model_file: String,
    /// The searched configuration, replayable through `final_train`
    pub space_sample: serde_json::Value,
    #[serde(default)]
    pub memo: TrialMemo,
}

impl Trial {
    pub fn new(trial_no: usize, reward: f64, model_file: impl Into<String>) -> Self {
        Self {
            trial_no,
            reward,
            model_file: model_file.into(),
            space_sample: serde_json::Value::Null,
            memo: TrialMemo::default(),
        }
    }

    pub fn with_space_sample(mut self, space_sample: serde_json::Value) -> Self {
        self.space_sample = space_sample;
        self
    }

    pub fn with_oof(mut self, oof: OutOfFold) -> Self {
        self.memo.oof = Some(oof);
        self
    }
}

/// Sort trials best first; the sort is stable so equal rewards keep their order
pub fn rank_trials(trials: &mut [Trial]) {
    trials.sort_by(|a, b| b.reward.partial_cmp(&a.reward).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rank_trials_is_stable() {
        let mut trials = vec![
            Trial::new(0, 0.5, "a"),
            Trial::new(1, 0.9, "b"),
            Trial::new(2, 0.5, "c"),
        ];
        rank_trials(&mut trials);
        let order: Vec<usize> = trials.iter().map(|t| t.trial_no).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_oof_dimensions() {
        let v = OutOfFold::Vector(array![0.1, 0.2, 0.3]);
        let m = OutOfFold::Matrix(array![[0.1, 0.9], [0.5, 0.5]]);
        assert_eq!(v.n_samples(), 3);
        assert_eq!(v.n_columns(), None);
        assert_eq!(m.n_samples(), 2);
        assert_eq!(m.n_columns(), Some(2));
    }
}
