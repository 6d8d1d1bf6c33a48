//! Fitted inference pipeline produced by an experiment

use super::step::ExperimentStep;
use crate::error::Result;
use crate::model::SharedEstimator;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the terminal stage in [`InferencePipeline::step_names`]
pub const ESTIMATOR_STEP: &str = "estimator";

/// Ordered chain of fitted steps ending in the final estimator.
///
/// Prediction replays every step's `transform` in fit order and hands the
/// result to the estimator.
pub struct InferencePipeline {
    steps: Vec<Box<dyn ExperimentStep>>,
    estimator: SharedEstimator,
}

impl InferencePipeline {
    pub fn new(steps: Vec<Box<dyn ExperimentStep>>, estimator: SharedEstimator) -> Self {
        Self { steps, estimator }
    }

    /// Apply every step's transform in order
    pub fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let mut out = x.clone();
        for step in &self.steps {
            out = step.transform(&out)?;
            debug!(step = step.name(), width = out.width(), "pipeline transform");
        }
        Ok(out)
    }

    pub fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let x = self.transform(x)?;
        self.estimator.predict(&x)
    }

    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let x = self.transform(x)?;
        self.estimator.predict_proba(&x)
    }

    /// Step names in order, followed by `"estimator"`
    pub fn step_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(ESTIMATOR_STEP))
            .collect()
    }

    pub fn steps(&self) -> &[Box<dyn ExperimentStep>] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&dyn ExperimentStep> {
        self.steps.iter().find(|s| s.name() == name).map(|s| s.as_ref())
    }

    pub fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePipeline")
            .field("steps", &self.step_names())
            .field("estimator", &self.estimator.name())
            .finish()
    }
}

/// Which features survived the experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    /// Columns after data cleaning
    pub original_features: Vec<String>,
    /// Columns reaching the estimator
    pub selected_features: Vec<String>,
    /// `original_features` minus `selected_features`, in original order
    pub dropped_features: Vec<String>,
}

impl FeatureReport {
    pub fn new(original_features: Vec<String>, selected_features: Vec<String>) -> Self {
        let dropped_features = original_features
            .iter()
            .filter(|f| !selected_features.contains(f))
            .cloned()
            .collect();
        Self {
            original_features,
            selected_features,
            dropped_features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::error::KolosalError;
    use crate::experiment::step::StepContext;
    use crate::model::Estimator;
    use crate::search::SearchEngine;
    use polars::prelude::*;
    use std::sync::Arc;

    struct KeepColumn(&'static str);

    impl ExperimentStep for KeepColumn {
        fn name(&self) -> &str {
            "keep"
        }

        fn fit_transform(&mut self, _: &dyn SearchEngine, data: Dataset, _: &StepContext<'_>) -> Result<Dataset> {
            Ok(data)
        }

        fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
            Ok(x.select([self.0])?)
        }
    }

    struct SumEstimator;

    impl Estimator for SumEstimator {
        fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
            if x.width() != 1 {
                return Err(KolosalError::InvalidInput("expected one column".to_string()));
            }
            let col = crate::data::frame::column_to_f64(x, "b")?;
            Ok(Array1::from(col))
        }
    }

    #[test]
    fn test_pipeline_chains_transforms() {
        let pipeline = InferencePipeline::new(vec![Box::new(KeepColumn("b"))], Arc::new(SumEstimator));
        let x = df!("a" => &[1.0, 2.0], "b" => &[3.0, 4.0]).unwrap();

        assert_eq!(pipeline.predict(&x).unwrap().to_vec(), vec![3.0, 4.0]);
        assert_eq!(pipeline.step_names(), vec!["keep", "estimator"]);
        assert!(pipeline.step("keep").is_some());
        assert!(pipeline.step("missing").is_none());
        assert!(pipeline.predict_proba(&x).is_err());
    }

    #[test]
    fn test_feature_report() {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let report = FeatureReport::new(names(&["a", "b", "c", "d"]), names(&["d", "b"]));
        assert_eq!(report.dropped_features, names(&["a", "c"]));
    }
}
