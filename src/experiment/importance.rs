//! Permutation-importance feature selection step

use super::step::{apply_mask, ExperimentStep, FeatureMask, StepContext};
use crate::data::{frame, Dataset};
use crate::error::{KolosalError, Result};
use crate::feature_selection::{ImportanceEvaluator, ImportanceResult};
use crate::search::SearchEngine;
use polars::prelude::DataFrame;
use serde_json::json;
use tracing::{debug, warn};

/// Drops features whose permutation importance under the top trials'
/// estimators falls below a threshold.
///
/// The engine handed to `fit_transform` must already hold searched trials.
pub struct PermutationImportanceStep {
    name: String,
    evaluator: Box<dyn ImportanceEvaluator>,
    n_estimators: usize,
    threshold: f64,
    n_repeats: usize,
    mask: Option<FeatureMask>,
    unselected: Vec<String>,
    importances: Option<ImportanceResult>,
    output: Option<serde_json::Value>,
}

impl PermutationImportanceStep {
    pub fn new(
        name: impl Into<String>,
        evaluator: Box<dyn ImportanceEvaluator>,
        n_estimators: usize,
        threshold: f64,
        n_repeats: usize,
    ) -> Self {
        Self {
            name: name.into(),
            evaluator,
            n_estimators,
            threshold,
            n_repeats,
            mask: None,
            unselected: Vec::new(),
            importances: None,
            output: None,
        }
    }

    pub fn selected_features(&self) -> Option<&[String]> {
        self.mask.as_ref().and_then(|m| m.columns())
    }

    /// Features dropped by the fit, in input order
    pub fn unselected_features(&self) -> &[String] {
        &self.unselected
    }

    pub fn importances(&self) -> Option<&ImportanceResult> {
        self.importances.as_ref()
    }
}

impl ExperimentStep for PermutationImportanceStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(
        &mut self,
        engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        ctx.start(&self.name, "evaluate feature importance");

        let trials = engine.top_trials(self.n_estimators);
        if trials.is_empty() {
            return Err(KolosalError::InvalidInput(
                "search produced no trials to evaluate importance with".to_string(),
            ));
        }
        let estimators = trials
            .iter()
            .map(|t| engine.load_estimator(&t.model_file))
            .collect::<Result<Vec<_>>>()?;
        ctx.progress(&self.name, "load estimators");

        let (x_eval, y_eval) = match data.eval_pair() {
            Some(pair) => pair,
            None => {
                warn!(step = %self.name, "no eval set, evaluating importance on the training set");
                (&data.x_train, &data.y_train)
            }
        };
        let importances = self.evaluator.evaluate(
            &estimators,
            x_eval,
            y_eval,
            ctx.scorer,
            ctx.task,
            self.n_repeats,
        )?;

        // statistics are matched to columns by name, never by position alone
        let columns = frame::column_names(&data.x_train);
        if importances.columns != columns {
            return Err(KolosalError::AlignmentError(format!(
                "importance columns {:?} do not match training columns {:?}",
                importances.columns, columns
            )));
        }
        if importances.importances_mean.len() != columns.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} importances", columns.len()),
                actual: format!("{}", importances.importances_mean.len()),
            });
        }

        let (mut selected, mut unselected) = (Vec::new(), Vec::new());
        for (name, &mean) in columns.iter().zip(&importances.importances_mean) {
            if mean < self.threshold {
                unselected.push(name.clone());
            } else {
                selected.push(name.clone());
            }
        }
        if selected.is_empty() {
            warn!(step = %self.name, "every feature is below the importance threshold, keeping all");
            selected = columns;
            unselected.clear();
        }
        ctx.progress(&self.name, "calc importance");

        let data = if unselected.is_empty() {
            data
        } else {
            debug!(dropped = ?unselected, "dropping unimportant features");
            data.select_features(&selected, &self.name)?
        };
        ctx.progress(&self.name, "drop features");

        let output = json!({
            "importances": importances,
            "selected_features": selected,
            "unselected_features": unselected,
        });
        ctx.end(&self.name, output.clone());

        self.mask = Some(FeatureMask::Columns(selected));
        self.unselected = unselected;
        self.importances = Some(importances);
        self.output = Some(output);
        Ok(data)
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        apply_mask(&self.name, self.mask.as_ref(), x)
    }

    fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }
}
