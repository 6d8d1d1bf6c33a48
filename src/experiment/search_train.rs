//! Search-and-train step and the search/ensemble helpers shared with the
//! two-stage variant

use super::step::{ExperimentStep, StepContext};
use crate::data::{frame, Dataset};
use crate::ensemble::{stack_oof, GreedyEnsemble};
use crate::error::{KolosalError, Result};
use crate::model::{Estimator, SharedEstimator};
use crate::search::{SearchEngine, SearchRequest};
use polars::prelude::DataFrame;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Search on an independent fork of `engine`; `engine` itself is untouched
pub(crate) fn run_search(
    engine: &dyn SearchEngine,
    data: &Dataset,
    ctx: &StepContext<'_>,
    step: &str,
    label: &str,
) -> Result<Box<dyn SearchEngine>> {
    ctx.start(step, label);

    let options = ctx.options;
    let request = SearchRequest {
        x_train: &data.x_train,
        y_train: &data.y_train,
        x_eval: data.x_eval.as_ref(),
        y_eval: data.y_eval.as_ref(),
        cv: options.cv,
        num_folds: options.num_folds,
        eval_set: data.eval_pair(),
        options: &options.search,
    };

    let mut searched = engine.fork();
    searched.search(request)?;

    let best = searched
        .best_trial()
        .ok_or_else(|| KolosalError::InvalidInput("search produced no trials".to_string()))?;
    info!(step, best_reward = best.reward, "search finished");
    ctx.end(step, json!({ "best_reward": best.reward }));
    Ok(searched)
}

/// Fit a greedy ensemble over the top `top_k` trials.
///
/// Under cross-validation the stacked out-of-fold predictions are used when
/// the trials carry them; with `require_oof` their absence is an error,
/// otherwise the ensemble falls back to the eval set.
pub(crate) fn fit_greedy_ensemble(
    engine: &dyn SearchEngine,
    data: &Dataset,
    ctx: &StepContext<'_>,
    top_k: usize,
    require_oof: bool,
) -> Result<GreedyEnsemble> {
    let trials = engine.top_trials(top_k);
    if trials.is_empty() {
        return Err(KolosalError::InvalidInput("search produced no trials".to_string()));
    }
    let estimators = trials
        .iter()
        .map(|t| engine.load_estimator(&t.model_file))
        .collect::<Result<Vec<_>>>()?;

    let oof = if ctx.options.cv { stack_oof(&trials)? } else { None };
    let mut ensemble = GreedyEnsemble::new(ctx.task, estimators, ctx.scorer, top_k);

    match (oof, data.eval_pair()) {
        (Some(oof), _) => {
            debug!(shape = ?oof.shape(), "fitting ensemble on out-of-fold predictions");
            ensemble.fit(None, &data.y_train, Some(&oof))?;
        }
        (None, _) if ctx.options.cv && require_oof => {
            return Err(KolosalError::InvalidInput(
                "cross-validated trials carry no out-of-fold predictions".to_string(),
            ));
        }
        (None, Some((x_eval, y_eval))) => ensemble.fit(Some(x_eval), y_eval, None)?,
        (None, None) => {
            return Err(KolosalError::InvalidInput(
                "ensemble needs an eval set or out-of-fold predictions".to_string(),
            ));
        }
    }
    Ok(ensemble)
}

/// Produce the final estimator from a searched engine
pub(crate) fn final_train(
    engine: &dyn SearchEngine,
    data: &Dataset,
    ctx: &StepContext<'_>,
    step: &str,
) -> Result<SharedEstimator> {
    let options = ctx.options;
    if options.ensemble_size > 1 {
        ctx.start(step, "ensemble");
        let ensemble = fit_greedy_ensemble(engine, data, ctx, options.ensemble_size, true)?;
        ctx.end(
            step,
            json!({
                "ensemble": {
                    "estimators": ensemble.n_estimators(),
                    "weights": ensemble.weights(),
                    "scores": ensemble.scores(),
                }
            }),
        );
        return Ok(Arc::new(ensemble));
    }

    ctx.start(step, "load estimator");
    let best = engine
        .best_trial()
        .ok_or_else(|| KolosalError::InvalidInput("search produced no trials".to_string()))?;

    let estimator: Box<dyn Estimator> = if options.retrain_on_wholedata {
        ctx.progress(step, "retrain on whole data");
        match data.eval_pair() {
            Some((x_eval, y_eval)) => {
                let x_all = frame::concat_rows(&[&data.x_train, x_eval])?;
                let y_all = frame::concat_labels(&[&data.y_train, y_eval])?;
                engine.final_train(&best.space_sample, &x_all, &y_all)?
            }
            None => {
                debug!("no eval set, retraining on the training set only");
                engine.final_train(&best.space_sample, &data.x_train, &data.y_train)?
            }
        }
    } else {
        engine.load_estimator(&best.model_file)?
    };

    ctx.end(step, json!({ "estimator": estimator.name(), "trial_no": best.trial_no }));
    Ok(Arc::from(estimator))
}

/// One search followed by the final estimator
pub struct SearchAndTrainStep {
    name: String,
    searched: Option<Box<dyn SearchEngine>>,
    estimator: Option<SharedEstimator>,
}

impl SearchAndTrainStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            searched: None,
            estimator: None,
        }
    }

    /// The engine fork that ran the search
    pub fn searched_engine(&self) -> Option<&dyn SearchEngine> {
        self.searched.as_deref()
    }
}

impl ExperimentStep for SearchAndTrainStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(
        &mut self,
        engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        let searched = run_search(engine, &data, ctx, &self.name, "first stage search")?;
        let estimator = final_train(searched.as_ref(), &data, ctx, &self.name)?;
        self.searched = Some(searched);
        self.estimator = Some(estimator);
        Ok(data)
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        if self.estimator.is_none() {
            return Err(KolosalError::not_fitted(&self.name));
        }
        Ok(x.clone())
    }

    fn estimator(&self) -> Option<SharedEstimator> {
        self.estimator.clone()
    }
}
