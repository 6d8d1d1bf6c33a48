//! Kolosal Experiment - stepped AutoML experiment engine
//!
//! This crate drives an AutoML experiment as an ordered chain of steps over
//! a shared train/eval/test dataset:
//! - Data cleaning and eval-set carving (random or adversarial)
//! - Feature narrowing by multicollinearity, train/test drift and
//!   permutation importance
//! - Model search through a caller-supplied search engine, with an optional
//!   second search after pseudo-labeling or feature selection
//! - Greedy ensembling over the best trials, on eval predictions or stacked
//!   out-of-fold predictions
//!
//! The result is an [`experiment::InferencePipeline`]: every fitted step's
//! transform followed by the final estimator.
//!
//! # Modules
//!
//! ## Experiment
//! - [`experiment`] - Steps, the stepped driver and the canonical experiment
//! - [`search`] - Search engine interface and trials
//! - [`model`] - Fitted estimator interface
//! - [`ensemble`] - Out-of-fold stacking and greedy ensembling
//!
//! ## Collaborators
//! - [`cleaning`] - Data cleaning
//! - [`drift`] - Adversarial splitting and drift feature selection
//! - [`feature_selection`] - Multicollinearity and permutation importance
//!
//! ## Foundations
//! - [`data`] - Dataset tuple, frame helpers, splitting
//! - [`metrics`] - Scorers
//! - [`utils`] - Logging setup

// Core error handling
pub mod error;

// Foundations
pub mod data;
pub mod metrics;
pub mod model;
pub mod utils;

// Collaborators
pub mod cleaning;
pub mod drift;
pub mod feature_selection;

// Search and ensembling
pub mod ensemble;
pub mod search;

// Experiment
pub mod experiment;

pub use error::{KolosalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result};

    // Data
    pub use crate::data::{train_test_split, Dataset, TaskType};
    pub use crate::metrics::{Predictions, Scorer};

    // Search and models
    pub use crate::model::{Estimator, SharedEstimator};
    pub use crate::search::{SearchEngine, SearchOptions, SearchRequest, Trial};
    pub use crate::ensemble::GreedyEnsemble;

    // Collaborators
    pub use crate::cleaning::{BasicDataCleaner, DataCleaner, DataCleanerConfig};
    pub use crate::drift::{AdversarialSplitter, CentroidAdversarialSplitter, DriftFeatureSelector, KsDriftSelector};
    pub use crate::feature_selection::{
        CollinearitySelector, CorrelationLinkageSelector, ImportanceEvaluator, PermutationImportanceEvaluator,
    };

    // Experiment
    pub use crate::experiment::{
        Collaborators, CompeteExperiment, ExperimentOptions, ExperimentOutcome, ExperimentStep, FeatureReport,
        InferencePipeline, Mode, ProgressSink, SplitStrategy, SteppedExperiment,
    };
}
