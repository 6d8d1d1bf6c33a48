//! Search engine interface
//!
//! The search engine explores model configurations and keeps the resulting
//! trials. The experiment treats it as a value-like resource: every
//! independent search runs on a fresh [`SearchEngine::fork`] so that the
//! trials of an earlier search stay inspectable after a later one.

mod trial;

pub use trial::{rank_trials, OutOfFold, Trial, TrialMemo};

use crate::error::Result;
use crate::model::Estimator;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Engine-specific knobs forwarded with every search call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Upper bound on evaluated trials
    pub max_trials: Option<usize>,
    /// Stop after this many trials without improvement
    pub early_stopping_rounds: Option<usize>,
    /// Wall-clock budget for one search call
    pub timeout_secs: Option<u64>,
}

/// Arguments of one search call
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub x_train: &'a DataFrame,
    pub y_train: &'a Array1<f64>,
    pub x_eval: Option<&'a DataFrame>,
    pub y_eval: Option<&'a Array1<f64>>,
    /// Evaluate trials with cross-validation instead of the eval set
    pub cv: bool,
    pub num_folds: usize,
    /// Early-stopping set for engines that support one
    pub eval_set: Option<(&'a DataFrame, &'a Array1<f64>)>,
    pub options: &'a SearchOptions,
}

/// Hyperparameter / architecture search engine
pub trait SearchEngine: Send + Sync {
    /// Independent snapshot of this engine; searching on it never mutates `self`
    fn fork(&self) -> Box<dyn SearchEngine>;

    /// Run a search, adding completed trials to this engine
    fn search(&mut self, request: SearchRequest<'_>) -> Result<()>;

    /// The `k` highest-reward trials, best first, ties in engine order
    fn top_trials(&self, k: usize) -> Vec<&Trial>;

    /// The highest-reward trial
    fn best_trial(&self) -> Option<&Trial> {
        self.top_trials(1).into_iter().next()
    }

    /// Deserialize the estimator persisted for a trial
    fn load_estimator(&self, model_file: &str) -> Result<Box<dyn Estimator>>;

    /// Retrain one searched configuration on the given data
    fn final_train(
        &self,
        space_sample: &serde_json::Value,
        x: &DataFrame,
        y: &Array1<f64>,
    ) -> Result<Box<dyn Estimator>>;
}
