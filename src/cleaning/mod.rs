//! Data cleaning
//!
//! The experiment fits one cleaner on the training set and replays it on the
//! eval and test sets and at inference time.

mod basic;

pub use basic::BasicDataCleaner;

use crate::data::frame;
use crate::error::Result;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Options for [`BasicDataCleaner`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCleanerConfig {
    /// Columns removed unconditionally
    pub drop_columns: Vec<String>,
    /// Drop columns holding a single value (nulls count as a value)
    pub drop_constant_columns: bool,
    /// Drop string columns whose values are all distinct
    pub drop_idness_columns: bool,
    /// Drop training rows whose label is NaN
    pub drop_label_nan_rows: bool,
    /// Treat +/-inf as missing
    pub replace_inf_values: bool,
    /// Fill missing numeric values with the training mean
    pub fill_numeric_nulls: bool,
}

impl Default for DataCleanerConfig {
    fn default() -> Self {
        Self {
            drop_columns: Vec::new(),
            drop_constant_columns: true,
            drop_idness_columns: true,
            drop_label_nan_rows: true,
            replace_inf_values: true,
            fill_numeric_nulls: true,
        }
    }
}

impl DataCleanerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    pub fn with_drop_constant_columns(mut self, enabled: bool) -> Self {
        self.drop_constant_columns = enabled;
        self
    }

    pub fn with_drop_idness_columns(mut self, enabled: bool) -> Self {
        self.drop_idness_columns = enabled;
        self
    }
}

/// Learns a cleaning transform on the training set
pub trait DataCleaner: Send + Sync {
    /// Learn the cleaning rules from `(x, y)` and return the cleaned pair
    fn fit_transform(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<(DataFrame, Array1<f64>)>;

    /// Apply the learned rules to an unlabeled frame
    fn transform(&self, x: &DataFrame) -> Result<DataFrame>;

    /// Apply the learned rules to a labeled frame, dropping rows with a missing label
    fn transform_labeled(&self, x: &DataFrame, y: &Array1<f64>) -> Result<(DataFrame, Array1<f64>)> {
        frame::check_rows(x, y, "X")?;
        let keep: Vec<usize> = (0..y.len()).filter(|&i| !y[i].is_nan()).collect();
        let (x, y) = if keep.len() == y.len() {
            (x.clone(), y.clone())
        } else {
            (frame::take_rows(x, &keep)?, frame::take_labels(y, &keep))
        };
        Ok((self.transform(&x)?, y))
    }

    fn name(&self) -> &str {
        "data_cleaner"
    }
}
