//! Stepped AutoML experiment
//!
//! An experiment is an ordered list of [`ExperimentStep`]s. Each step takes
//! the [`Dataset`](crate::data::Dataset) by value, fits its state and hands a
//! possibly narrowed dataset to the next step. The last step searches models
//! through a caller-supplied [`SearchEngine`](crate::search::SearchEngine)
//! and produces the final estimator.
//!
//! Steps:
//! - [`DataCleanStep`] - cleaning and eval-set carving
//! - [`MulticollinearityStep`] - drops correlated features
//! - [`DriftDetectStep`] - drops features that drift between train and test
//! - [`PermutationImportanceStep`] - drops unimportant features
//! - [`SearchAndTrainStep`] - one search, then the final estimator
//! - [`TwoStageSearchAndTrainStep`] - pseudo-labeling and importance
//!   selection between two searches

mod collinearity;
mod compete;
mod config;
mod data_clean;
mod drift;
mod importance;
mod pipeline;
mod progress;
mod search_train;
mod step;
mod stepped;
mod two_stage;

pub use collinearity::MulticollinearityStep;
pub use compete::{
    Collaborators, CompeteExperiment, BASE_SEARCH_AND_TRAIN, DATA_CLEAN, DRIFT_DETECTION, MULTICOLLINEARITY,
    TWO_STAGE_SEARCH_AND_TRAIN,
};
pub use config::{ExperimentOptions, Mode, SplitStrategy};
pub use data_clean::DataCleanStep;
pub use drift::DriftDetectStep;
pub use importance::PermutationImportanceStep;
pub use pipeline::{FeatureReport, InferencePipeline, ESTIMATOR_STEP};
pub use progress::{ProgressEvent, ProgressKind, ProgressSink, RecordingProgress, TracingProgress};
pub use search_train::SearchAndTrainStep;
pub use step::{ExperimentStep, FeatureMask, StepContext};
pub use stepped::{ExperimentOutcome, SteppedExperiment};
pub use two_stage::{binary_pseudo_labels, select_pseudo_labels, PseudoLabels, TwoStageSearchAndTrainStep};
