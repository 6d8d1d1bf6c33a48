//! Train/test drift handling
//!
//! Two collaborators live here:
//! - an adversarial splitter that carves an eval set resembling the test set
//!   out of the training data
//! - a drift feature selector that rejects features whose train and test
//!   distributions differ

mod adversarial;
mod ks;

pub use adversarial::CentroidAdversarialSplitter;
pub use ks::{ks_statistic, KsDriftSelector};

use crate::data::SplitParts;
use crate::error::Result;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Distribution-aware train/eval splitter
pub trait AdversarialSplitter: Send + Sync {
    /// Learn how training rows differ from test rows
    fn fit(&mut self, x_train: &DataFrame, x_test: &DataFrame) -> Result<()>;

    /// Split `(x, y)` so that the eval part resembles the test distribution
    fn train_test_split(&self, x: &DataFrame, y: &Array1<f64>, test_size: f64) -> Result<SplitParts>;
}

/// One rejection round of drift feature selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRound {
    pub removed: String,
    pub score: f64,
    /// Features still kept after this round
    pub remaining: usize,
}

/// Result of drift feature selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSelection {
    /// Kept features, in input order
    pub features: Vec<String>,
    pub history: Vec<DriftRound>,
    /// Drift score of every input feature, in input order
    pub scores: Vec<(String, f64)>,
}

/// Rejects features that drift between train and test
pub trait DriftFeatureSelector: Send + Sync {
    fn select(&self, x_train: &DataFrame, x_test: &DataFrame) -> Result<DriftSelection>;
}
