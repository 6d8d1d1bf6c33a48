//! Experiment configuration

use crate::cleaning::DataCleanerConfig;
use crate::data::TaskType;
use crate::error::{KolosalError, Result};
use crate::metrics::Scorer;
use crate::search::SearchOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which search-and-train step ends the experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// One search, then the final estimator
    OneStage,
    /// Pseudo-labeling and importance selection between two searches
    TwoStage,
}

/// How the eval set is carved out of the training data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Stratified random split for classification, plain random otherwise
    Random,
    /// Eval rows chosen to resemble the test set; needs a test set
    AdversarialValidation,
}

/// Options of one experiment run, passed by reference through every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentOptions {
    /// Inferred from the training labels when absent
    pub task: Option<TaskType>,
    /// Share of the training rows moved to the eval set
    pub eval_size: f64,
    pub cv: bool,
    pub num_folds: usize,
    pub random_state: u64,
    /// Defaults to neg log-loss (classification) or neg MSE (regression)
    pub scorer: Option<Scorer>,
    pub train_test_split_strategy: SplitStrategy,
    pub data_cleaner: DataCleanerConfig,

    pub drop_feature_with_collinearity: bool,
    /// Absolute rank correlation at which features are grouped
    pub collinearity_threshold: f64,

    pub drift_detection: bool,
    pub drift_threshold: f64,
    pub drift_max_remove_ratio: f64,

    pub mode: Mode,
    pub two_stage_importance_selection: bool,
    /// Number of top trials whose estimators are used for importance
    pub n_est_feature_importance: usize,
    /// Features with mean importance below this are dropped
    pub importance_threshold: f64,
    pub importance_repeats: usize,

    pub ensemble_size: usize,
    pub pseudo_labeling: bool,
    pub pseudo_labeling_proba_threshold: f64,
    pub pseudo_labeling_resplit: bool,
    pub retrain_on_wholedata: bool,

    /// Forwarded to every search call
    pub search: SearchOptions,
    /// Tracing filter installed when the experiment is created
    pub log_level: Option<String>,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            task: None,
            eval_size: 0.3,
            cv: false,
            num_folds: 3,
            random_state: 9527,
            scorer: None,
            train_test_split_strategy: SplitStrategy::Random,
            data_cleaner: DataCleanerConfig::default(),
            drop_feature_with_collinearity: false,
            collinearity_threshold: 0.9,
            drift_detection: true,
            drift_threshold: 0.3,
            drift_max_remove_ratio: 0.3,
            mode: Mode::OneStage,
            two_stage_importance_selection: true,
            n_est_feature_importance: 10,
            importance_threshold: 1e-5,
            importance_repeats: 5,
            ensemble_size: 7,
            pseudo_labeling: false,
            pseudo_labeling_proba_threshold: 0.8,
            pseudo_labeling_resplit: false,
            retrain_on_wholedata: false,
            search: SearchOptions::default(),
            log_level: None,
        }
    }
}

impl ExperimentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_task(mut self, task: TaskType) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_eval_size(mut self, eval_size: f64) -> Self {
        self.eval_size = eval_size;
        self
    }

    pub fn with_cv(mut self, num_folds: usize) -> Self {
        self.cv = true;
        self.num_folds = num_folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_split_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.train_test_split_strategy = strategy;
        self
    }

    pub fn with_data_cleaner(mut self, config: DataCleanerConfig) -> Self {
        self.data_cleaner = config;
        self
    }

    pub fn with_collinearity(mut self, enabled: bool) -> Self {
        self.drop_feature_with_collinearity = enabled;
        self
    }

    pub fn with_drift_detection(mut self, enabled: bool) -> Self {
        self.drift_detection = enabled;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_importance_selection(mut self, enabled: bool) -> Self {
        self.two_stage_importance_selection = enabled;
        self
    }

    pub fn with_importance_threshold(mut self, threshold: f64) -> Self {
        self.importance_threshold = threshold;
        self
    }

    pub fn with_ensemble_size(mut self, size: usize) -> Self {
        self.ensemble_size = size;
        self
    }

    /// Enable pseudo-labeling with the given confidence threshold
    pub fn with_pseudo_labeling(mut self, threshold: f64, resplit: bool) -> Self {
        self.pseudo_labeling = true;
        self.pseudo_labeling_proba_threshold = threshold;
        self.pseudo_labeling_resplit = resplit;
        self
    }

    pub fn with_retrain_on_wholedata(mut self, enabled: bool) -> Self {
        self.retrain_on_wholedata = enabled;
        self
    }

    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Reject option combinations that cannot run
    pub fn validate(&self) -> Result<()> {
        if !(self.eval_size > 0.0 && self.eval_size < 1.0) {
            return Err(KolosalError::ConfigError(format!(
                "eval_size must be in (0, 1), got {}",
                self.eval_size
            )));
        }

        if self.cv && self.num_folds < 2 {
            return Err(KolosalError::ConfigError(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.num_folds
            )));
        }

        if self.cv && self.train_test_split_strategy == SplitStrategy::AdversarialValidation {
            return Err(KolosalError::ConfigError(
                "adversarial validation split cannot be combined with cross-validation".to_string(),
            ));
        }

        let t = self.pseudo_labeling_proba_threshold;
        if !(t > 0.5 && t <= 1.0) {
            return Err(KolosalError::ConfigError(format!(
                "pseudo_labeling_proba_threshold must be in (0.5, 1], got {}",
                t
            )));
        }

        if self.mode == Mode::TwoStage
            && self.two_stage_importance_selection
            && (self.n_est_feature_importance == 0 || self.importance_repeats == 0)
        {
            return Err(KolosalError::ConfigError(
                "importance selection needs n_est_feature_importance and importance_repeats above 0"
                    .to_string(),
            ));
        }

        if self.pseudo_labeling && self.task == Some(TaskType::Regression) {
            return Err(KolosalError::ConfigError(
                "pseudo-labeling requires a classification task".to_string(),
            ));
        }

        if let (Some(scorer), Some(task)) = (self.scorer, self.task) {
            if !scorer.supports(task) {
                return Err(KolosalError::ConfigError(format!(
                    "scorer {:?} does not apply to {:?} tasks",
                    scorer, task
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExperimentOptions::default();
        assert_eq!(options.eval_size, 0.3);
        assert_eq!(options.num_folds, 3);
        assert_eq!(options.random_state, 9527);
        assert_eq!(options.ensemble_size, 7);
        assert_eq!(options.mode, Mode::OneStage);
        assert!(options.drift_detection);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_combinations() {
        let cases = vec![
            ExperimentOptions::default().with_eval_size(1.0),
            ExperimentOptions::default().with_cv(1),
            ExperimentOptions::default()
                .with_cv(3)
                .with_split_strategy(SplitStrategy::AdversarialValidation),
            ExperimentOptions::default().with_pseudo_labeling(0.4, false),
            ExperimentOptions::default()
                .with_task(TaskType::Regression)
                .with_pseudo_labeling(0.9, false),
            ExperimentOptions::default()
                .with_task(TaskType::Binary)
                .with_scorer(Scorer::R2),
        ];
        for options in cases {
            assert!(matches!(options.validate(), Err(KolosalError::ConfigError(_))));
        }

        let mut options = ExperimentOptions::default().with_mode(Mode::TwoStage);
        options.importance_repeats = 0;
        assert!(options.validate().is_err());
        options.two_stage_importance_selection = false;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_json_partial_fields() {
        let options = ExperimentOptions::from_json_str(
            r#"{"mode": "two-stage", "cv": true, "num_folds": 5, "scorer": "accuracy"}"#,
        )
        .unwrap();
        assert_eq!(options.mode, Mode::TwoStage);
        assert!(options.cv);
        assert_eq!(options.num_folds, 5);
        assert_eq!(options.scorer, Some(Scorer::Accuracy));
        assert_eq!(options.eval_size, 0.3);

        assert!(matches!(
            ExperimentOptions::from_json_str(r#"{"eval_size": 0.0}"#),
            Err(KolosalError::ConfigError(_))
        ));
        assert!(matches!(
            ExperimentOptions::from_json_str("{not json"),
            Err(KolosalError::SerializationError(_))
        ));
    }
}
