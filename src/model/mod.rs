//! Fitted estimator interface
//!
//! Estimators are produced by the search engine (loaded from a trial's
//! persisted model or retrained on new data) and by the ensemble combiner.
//! The experiment only ever predicts with them.

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use std::sync::Arc;

/// A fitted model that predicts on feature tables
pub trait Estimator: Send + Sync {
    /// Point predictions: class labels for classifiers, values for regressors
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>>;

    /// Class probabilities, one column per entry of [`Estimator::classes`]
    fn predict_proba(&self, _x: &DataFrame) -> Result<Array2<f64>> {
        Err(KolosalError::InvalidInput(format!(
            "{} does not provide class probabilities",
            self.name()
        )))
    }

    /// Class labels in probability-column order (classifiers only)
    fn classes(&self) -> Option<&[f64]> {
        None
    }

    /// Short display name
    fn name(&self) -> &str {
        "estimator"
    }

    /// Ensemble estimators expose their members and weights
    fn ensemble_weights(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Shared handle to a fitted estimator
pub type SharedEstimator = Arc<dyn Estimator>;
