//! Canonical experiment assembled from options

use super::config::{ExperimentOptions, Mode};
use super::collinearity::MulticollinearityStep;
use super::data_clean::DataCleanStep;
use super::drift::DriftDetectStep;
use super::importance::PermutationImportanceStep;
use super::progress::{ProgressSink, TracingProgress};
use super::search_train::SearchAndTrainStep;
use super::step::ExperimentStep;
use super::stepped::{ExperimentOutcome, SteppedExperiment};
use super::two_stage::TwoStageSearchAndTrainStep;
use crate::cleaning::{BasicDataCleaner, DataCleaner};
use crate::data::Dataset;
use crate::drift::{AdversarialSplitter, CentroidAdversarialSplitter, DriftFeatureSelector, KsDriftSelector};
use crate::error::Result;
use crate::feature_selection::{
    CollinearitySelector, CorrelationLinkageSelector, ImportanceEvaluator, PermutationImportanceEvaluator,
};
use crate::search::SearchEngine;
use crate::utils::init_tracing;
use std::sync::Arc;
use tracing::info;

pub const DATA_CLEAN: &str = "data_clean";
pub const MULTICOLLINEARITY: &str = "select_by_multicollinearity";
pub const DRIFT_DETECTION: &str = "drift_detection";
pub const BASE_SEARCH_AND_TRAIN: &str = "base_search_and_train";
pub const TWO_STAGE_SEARCH_AND_TRAIN: &str = "two_stage_search_and_train";

/// Injected implementations of every collaborator the steps call
pub struct Collaborators {
    pub cleaner: Box<dyn DataCleaner>,
    pub splitter: Box<dyn AdversarialSplitter>,
    pub drift_selector: Box<dyn DriftFeatureSelector>,
    pub collinearity: Box<dyn CollinearitySelector>,
    pub importance: Box<dyn ImportanceEvaluator>,
    pub progress: Arc<dyn ProgressSink>,
}

impl Collaborators {
    /// Default implementations configured from the options
    pub fn from_options(options: &ExperimentOptions) -> Self {
        Self {
            cleaner: Box::new(BasicDataCleaner::new(options.data_cleaner.clone())),
            splitter: Box::new(CentroidAdversarialSplitter::new()),
            drift_selector: Box::new(KsDriftSelector::new(
                options.drift_threshold,
                options.drift_max_remove_ratio,
            )),
            collinearity: Box::new(CorrelationLinkageSelector::new(options.collinearity_threshold)),
            importance: Box::new(PermutationImportanceEvaluator::new(options.random_state)),
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::from_options(&ExperimentOptions::default())
    }
}

/// Data cleaning, optional feature narrowing, then one- or two-stage search
pub struct CompeteExperiment {
    inner: SteppedExperiment,
}

impl CompeteExperiment {
    pub fn new(options: ExperimentOptions, collaborators: Collaborators) -> Result<Self> {
        options.validate()?;
        if let Some(level) = options.log_level.as_deref() {
            init_tracing(Some(level));
        }

        let Collaborators {
            cleaner,
            splitter,
            drift_selector,
            collinearity,
            importance,
            progress,
        } = collaborators;

        let mut steps: Vec<Box<dyn ExperimentStep>> = vec![Box::new(DataCleanStep::new(DATA_CLEAN, cleaner, splitter))];
        if options.drop_feature_with_collinearity {
            steps.push(Box::new(MulticollinearityStep::new(MULTICOLLINEARITY, true, collinearity)));
        }
        if options.drift_detection {
            steps.push(Box::new(DriftDetectStep::new(DRIFT_DETECTION, true, drift_selector)));
        }
        match options.mode {
            Mode::OneStage => steps.push(Box::new(SearchAndTrainStep::new(BASE_SEARCH_AND_TRAIN))),
            Mode::TwoStage => {
                let pi = options.two_stage_importance_selection.then(|| {
                    PermutationImportanceStep::new(
                        format!("{}_pi", TWO_STAGE_SEARCH_AND_TRAIN),
                        importance,
                        options.n_est_feature_importance,
                        options.importance_threshold,
                        options.importance_repeats,
                    )
                });
                steps.push(Box::new(TwoStageSearchAndTrainStep::new(TWO_STAGE_SEARCH_AND_TRAIN, pi)));
            }
        }

        info!(mode = ?options.mode, steps = steps.len(), "compete experiment assembled");
        Ok(Self {
            inner: SteppedExperiment::new(steps, options, progress)?,
        })
    }

    /// Build with the default collaborators for `options`
    pub fn with_defaults(options: ExperimentOptions) -> Result<Self> {
        let collaborators = Collaborators::from_options(&options);
        Self::new(options, collaborators)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.inner.step_names()
    }

    pub fn options(&self) -> &ExperimentOptions {
        self.inner.options()
    }

    pub fn run(self, engine: &dyn SearchEngine, data: Dataset) -> Result<ExperimentOutcome> {
        self.inner.train(engine, data)
    }
}
