//! Dataset tuple and tabular helpers
//!
//! The [`Dataset`] is the unit of exchange between experiment steps:
//! `(X_train, y_train, X_test, X_eval, y_eval)`. Each step takes it by value
//! and hands a (possibly narrowed) dataset to the next one.

pub mod frame;
pub mod split;

pub use split::{split_indices, train_test_split, SplitParts};

use crate::error::{KolosalError, Result};
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Learning task of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Binary,
    Multiclass,
    Regression,
}

impl TaskType {
    /// Whether the task predicts class labels
    pub fn is_classification(&self) -> bool {
        matches!(self, TaskType::Binary | TaskType::Multiclass)
    }

    /// Infer the task from training labels
    pub fn infer(y: &Array1<f64>) -> Result<Self> {
        if y.is_empty() {
            return Err(KolosalError::InvalidInput(
                "cannot infer task from empty labels".to_string(),
            ));
        }

        if y.iter().any(|v| v.fract() != 0.0) {
            return Ok(TaskType::Regression);
        }

        let distinct: BTreeSet<i64> = y.iter().map(|&v| v as i64).collect();
        let limit = 20usize.max(y.len() / 100);
        Ok(match distinct.len() {
            0 | 1 => {
                return Err(KolosalError::InvalidInput(
                    "labels contain a single distinct value".to_string(),
                ))
            }
            2 => TaskType::Binary,
            n if n <= limit => TaskType::Multiclass,
            _ => TaskType::Regression,
        })
    }
}

/// The tuple of datasets threaded through the experiment steps
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x_train: DataFrame,
    pub y_train: Array1<f64>,
    pub x_test: Option<DataFrame>,
    pub x_eval: Option<DataFrame>,
    pub y_eval: Option<Array1<f64>>,
}

impl Dataset {
    /// Create a dataset with only a training set
    pub fn new(x_train: DataFrame, y_train: Array1<f64>) -> Self {
        Self {
            x_train,
            y_train,
            x_test: None,
            x_eval: None,
            y_eval: None,
        }
    }

    /// Attach an unlabeled test set
    pub fn with_test(mut self, x_test: DataFrame) -> Self {
        self.x_test = Some(x_test);
        self
    }

    /// Attach a labeled eval set
    pub fn with_eval(mut self, x_eval: DataFrame, y_eval: Array1<f64>) -> Self {
        self.x_eval = Some(x_eval);
        self.y_eval = Some(y_eval);
        self
    }

    /// Both halves of the eval set, when both are present
    pub fn eval_pair(&self) -> Option<(&DataFrame, &Array1<f64>)> {
        match (&self.x_eval, &self.y_eval) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }

    /// Check that every label vector lines up with its frame
    pub fn validate_rows(&self) -> Result<()> {
        frame::check_rows(&self.x_train, &self.y_train, "X_train")?;
        match (&self.x_eval, &self.y_eval) {
            (Some(x), Some(y)) => frame::check_rows(x, y, "X_eval"),
            (None, None) => Ok(()),
            (Some(_), None) => Err(KolosalError::AlignmentError(
                "X_eval supplied without y_eval".to_string(),
            )),
            (None, Some(_)) => Err(KolosalError::AlignmentError(
                "y_eval supplied without X_eval".to_string(),
            )),
        }
    }

    /// Check that train, eval and test share one column list
    pub fn validate_columns(&self) -> Result<()> {
        let expected = frame::column_names(&self.x_train);
        for (what, df) in [("X_eval", &self.x_eval), ("X_test", &self.x_test)] {
            if let Some(df) = df {
                let names = frame::column_names(df);
                if names != expected {
                    return Err(KolosalError::AlignmentError(format!(
                        "{} columns {:?} differ from X_train columns {:?}",
                        what, names, expected
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply a column mask to every present feature table
    pub fn select_features(mut self, features: &[String], context: &str) -> Result<Self> {
        self.x_train = frame::select_columns(&self.x_train, features, context)?;
        if let Some(x) = self.x_eval.take() {
            self.x_eval = Some(frame::select_columns(&x, features, context)?);
        }
        if let Some(x) = self.x_test.take() {
            self.x_test = Some(frame::select_columns(&x, features, context)?);
        }
        Ok(self)
    }

    /// Shape summary used in progress output
    pub fn shape_summary(&self) -> serde_json::Value {
        let shape = |df: &Option<DataFrame>| df.as_ref().map(|d| vec![d.height(), d.width()]);
        serde_json::json!({
            "X_train.shape": [self.x_train.height(), self.x_train.width()],
            "y_train.shape": [self.y_train.len()],
            "X_eval.shape": shape(&self.x_eval),
            "y_eval.shape": self.y_eval.as_ref().map(|y| vec![y.len()]),
            "X_test.shape": shape(&self.x_test),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_infer_task() {
        assert_eq!(TaskType::infer(&Array1::from(vec![0.0, 1.0, 1.0])).unwrap(), TaskType::Binary);
        assert_eq!(
            TaskType::infer(&Array1::from(vec![0.0, 1.0, 2.0, 1.0])).unwrap(),
            TaskType::Multiclass
        );
        assert_eq!(
            TaskType::infer(&Array1::from(vec![0.5, 1.2, 3.3])).unwrap(),
            TaskType::Regression
        );
        assert!(TaskType::infer(&Array1::from(vec![1.0, 1.0])).is_err());
    }

    #[test]
    fn test_validate_rows_and_columns() {
        let x = df!("a" => &[1.0, 2.0], "b" => &[3.0, 4.0]).unwrap();
        let ds = Dataset::new(x.clone(), Array1::from(vec![0.0, 1.0]))
            .with_test(x.select(["b", "a"]).unwrap());

        assert!(ds.validate_rows().is_ok());
        assert!(matches!(ds.validate_columns(), Err(KolosalError::AlignmentError(_))));

        let ds = ds.select_features(&["a".to_string()], "test").unwrap();
        assert!(ds.validate_columns().is_ok());
        assert_eq!(ds.x_test.as_ref().unwrap().width(), 1);
    }

    #[test]
    fn test_eval_without_labels_is_rejected() {
        let x = df!("a" => &[1.0, 2.0]).unwrap();
        let mut ds = Dataset::new(x.clone(), Array1::from(vec![0.0, 1.0]));
        ds.x_eval = Some(x);
        assert!(ds.validate_rows().is_err());
    }
}
