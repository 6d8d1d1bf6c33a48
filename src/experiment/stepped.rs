//! Experiment driver: folds the dataset through an ordered step list

use super::config::ExperimentOptions;
use super::pipeline::{FeatureReport, InferencePipeline};
use super::progress::ProgressSink;
use super::step::{ExperimentStep, StepContext};
use crate::data::{frame, Dataset, TaskType};
use crate::error::{KolosalError, Result};
use crate::metrics::Scorer;
use crate::search::SearchEngine;
use ndarray::Array1;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Everything a finished experiment hands back
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub pipeline: InferencePipeline,
    pub features: FeatureReport,
    pub task: TaskType,
    pub scorer: Scorer,
}

/// Runs a fixed list of steps once, in order
pub struct SteppedExperiment {
    steps: Vec<Box<dyn ExperimentStep>>,
    options: ExperimentOptions,
    progress: Arc<dyn ProgressSink>,
}

impl SteppedExperiment {
    pub fn new(
        steps: Vec<Box<dyn ExperimentStep>>,
        options: ExperimentOptions,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        if steps.is_empty() {
            return Err(KolosalError::ConfigError("experiment needs at least one step".to_string()));
        }
        options.validate()?;

        info!(
            steps = ?steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "experiment created"
        );
        Ok(Self {
            steps,
            options,
            progress,
        })
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn options(&self) -> &ExperimentOptions {
        &self.options
    }

    /// Fit every step in order and assemble the inference pipeline.
    ///
    /// The last step must produce the final estimator.
    pub fn train(mut self, engine: &dyn SearchEngine, data: Dataset) -> Result<ExperimentOutcome> {
        let start = Instant::now();
        data.validate_rows()?;
        data.validate_columns()?;
        let input_features = frame::column_names(&data.x_train);

        let task = match self.options.task {
            Some(task) => task,
            None => infer_task(&data.y_train)?,
        };
        let scorer = self.options.scorer.unwrap_or_else(|| Scorer::default_for(task));
        if !scorer.supports(task) {
            return Err(KolosalError::ConfigError(format!(
                "scorer {:?} does not apply to a {:?} task",
                scorer, task
            )));
        }
        info!(?task, ?scorer, rows = data.x_train.height(), "experiment started");

        let ctx = StepContext {
            options: &self.options,
            task,
            scorer,
            progress: self.progress.as_ref(),
        };

        let mut data = data;
        for step in self.steps.iter_mut() {
            let step_start = Instant::now();
            data = step.fit_transform(engine, data, &ctx)?;
            debug!(
                step = step.name(),
                features = data.x_train.width(),
                elapsed_ms = step_start.elapsed().as_millis() as u64,
                "step fitted"
            );
        }

        let last = self.steps.last().ok_or_else(|| {
            KolosalError::ConfigError("experiment needs at least one step".to_string())
        })?;
        let estimator = last.estimator().ok_or_else(|| {
            KolosalError::InvalidInput(format!("last step '{}' produced no estimator", last.name()))
        })?;

        let original_features = self
            .steps
            .iter()
            .find_map(|s| s.original_features().map(|f| f.to_vec()))
            .unwrap_or(input_features);
        let features = FeatureReport::new(original_features, frame::column_names(&data.x_train));

        info!(
            estimator = estimator.name(),
            selected = features.selected_features.len(),
            dropped = features.dropped_features.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "experiment finished"
        );

        Ok(ExperimentOutcome {
            pipeline: InferencePipeline::new(self.steps, estimator),
            features,
            task,
            scorer,
        })
    }
}

/// Task inference ignores missing labels; the cleaning step drops those rows later
fn infer_task(y: &Array1<f64>) -> Result<TaskType> {
    let labeled: Array1<f64> = y.iter().copied().filter(|v| !v.is_nan()).collect();
    TaskType::infer(&labeled)
}
