//! Feature selection collaborators
//!
//! Provides:
//! - Multicollinearity elimination by correlation-linkage clustering
//! - Permutation importance of fitted estimators

mod collinearity;
mod importance;

pub use collinearity::{spearman_correlation, CorrelationLinkageSelector};
pub use importance::PermutationImportanceEvaluator;

use crate::data::TaskType;
use crate::error::Result;
use crate::metrics::Scorer;
use crate::model::Estimator;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// One agglomeration step: clusters `left` and `right` merged at `distance`.
///
/// Cluster ids below the number of features are single features; id
/// `n_features + k` is the cluster created by merge `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkageMerge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// Result of multicollinearity selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollinearitySelection {
    /// Merges over the numeric features, in merge order
    pub linkage: Vec<LinkageMerge>,
    /// Kept features, in input order
    pub kept: Vec<String>,
    /// Dropped features, in input order
    pub dropped: Vec<String>,
}

/// Picks one representative per group of correlated features
pub trait CollinearitySelector: Send + Sync {
    fn select(&self, x: &DataFrame) -> Result<CollinearitySelection>;
}

/// Permutation importance aggregated over estimators and repeats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceResult {
    /// Evaluated columns; entry `i` of the statistics belongs to `columns[i]`
    pub columns: Vec<String>,
    pub importances_mean: Vec<f64>,
    pub importances_std: Vec<f64>,
}

/// Computes per-feature importance of fitted estimators on labeled data
pub trait ImportanceEvaluator: Send + Sync {
    fn evaluate(
        &self,
        estimators: &[Box<dyn Estimator>],
        x: &DataFrame,
        y: &Array1<f64>,
        scorer: Scorer,
        task: TaskType,
        n_repeats: usize,
    ) -> Result<ImportanceResult>;
}
