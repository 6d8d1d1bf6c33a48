//! Step protocol shared by every experiment stage

use super::config::ExperimentOptions;
use super::progress::ProgressSink;
use crate::data::{frame, Dataset, TaskType};
use crate::error::{KolosalError, Result};
use crate::metrics::Scorer;
use crate::model::SharedEstimator;
use crate::search::SearchEngine;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Read-only run state handed to every step
pub struct StepContext<'a> {
    pub options: &'a ExperimentOptions,
    pub task: TaskType,
    pub scorer: Scorer,
    pub progress: &'a dyn ProgressSink,
}

impl<'a> StepContext<'a> {
    pub fn start(&self, step: &str, label: &str) {
        self.progress.step_start(step, label);
    }

    pub fn progress(&self, step: &str, label: &str) {
        self.progress.step_progress(step, label);
    }

    pub fn end(&self, step: &str, output: serde_json::Value) {
        self.progress.step_end(step, output);
    }
}

/// One stage of a stepped experiment.
///
/// `fit_transform` runs exactly once per experiment and takes ownership of
/// the dataset; `transform` replays the fitted state on new feature tables
/// and fails with [`KolosalError::ModelNotFitted`] before the fit.
pub trait ExperimentStep: Send + Sync {
    fn name(&self) -> &str;

    fn fit_transform(
        &mut self,
        engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset>;

    fn transform(&self, x: &DataFrame) -> Result<DataFrame>;

    /// Final estimator, for steps that train one
    fn estimator(&self) -> Option<SharedEstimator> {
        None
    }

    /// Post-cleaning column list, for the data-preparation step
    fn original_features(&self) -> Option<&[String]> {
        None
    }

    /// Diagnostic payload reported at the end of the fit
    fn output(&self) -> Option<&serde_json::Value> {
        None
    }
}

/// Fitted column selection of a feature-narrowing step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureMask {
    /// The step was disabled or skipped; transform is the identity
    Passthrough,
    Columns(Vec<String>),
}

impl FeatureMask {
    pub fn columns(&self) -> Option<&[String]> {
        match self {
            FeatureMask::Passthrough => None,
            FeatureMask::Columns(c) => Some(c),
        }
    }
}

/// `transform` of a feature-narrowing step
pub(crate) fn apply_mask(step: &str, mask: Option<&FeatureMask>, x: &DataFrame) -> Result<DataFrame> {
    match mask {
        None => Err(KolosalError::not_fitted(step)),
        Some(FeatureMask::Passthrough) => Ok(x.clone()),
        Some(FeatureMask::Columns(columns)) => {
            debug!(step, from = x.width(), to = columns.len(), "transform features");
            frame::select_columns(x, columns, step)
        }
    }
}
