//! Two-stage search: pseudo-labeling and importance selection between a
//! first and an optional second search

use super::importance::PermutationImportanceStep;
use super::search_train::{final_train, fit_greedy_ensemble, run_search};
use super::step::{ExperimentStep, StepContext};
use crate::data::{frame, train_test_split, Dataset, TaskType};
use crate::error::{KolosalError, Result};
use crate::model::{Estimator, SharedEstimator};
use crate::search::SearchEngine;
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::DataFrame;
use tracing::{debug, info};

/// Rows of a binary positive-class probability vector that are confident
/// enough to pseudo-label: `(positive, negative)`.
///
/// Positive rows have `p > threshold`, negative rows `p < 1 - threshold`;
/// rows in between get no label.
pub fn binary_pseudo_labels(p_positive: ArrayView1<f64>, threshold: f64) -> (Vec<usize>, Vec<usize>) {
    let positive = p_positive
        .iter()
        .enumerate()
        .filter(|(_, &p)| p > threshold)
        .map(|(i, _)| i)
        .collect();
    let negative = p_positive
        .iter()
        .enumerate()
        .filter(|(_, &p)| p < 1.0 - threshold)
        .map(|(i, _)| i)
        .collect();
    (positive, negative)
}

/// Confidently labeled test rows
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoLabels {
    pub rows: Vec<usize>,
    pub labels: Array1<f64>,
}

/// Pick pseudo-labels from binary class probabilities: positives then
/// negatives, labels mapped through `classes`.
///
/// Only binary tasks are pseudo-labeled.
pub fn select_pseudo_labels(
    proba: &Array2<f64>,
    classes: &[f64],
    threshold: f64,
    task: TaskType,
) -> Result<PseudoLabels> {
    if task != TaskType::Binary {
        return Err(KolosalError::InvalidInput(format!(
            "pseudo-labeling requires a binary task, got {:?}",
            task
        )));
    }
    if proba.ncols() != 2 || classes.len() != 2 {
        return Err(KolosalError::ShapeError {
            expected: "probabilities for 2 classes".to_string(),
            actual: format!("{} columns for {} classes", proba.ncols(), classes.len()),
        });
    }

    let (positive, negative) = binary_pseudo_labels(proba.column(1), threshold);
    let labels = positive
        .iter()
        .map(|_| classes[1])
        .chain(negative.iter().map(|_| classes[0]))
        .collect();
    let mut rows = positive;
    rows.extend(negative);
    Ok(PseudoLabels { rows, labels })
}

/// Search, optionally pseudo-label and select features by importance, and
/// search again when either changed the training data
pub struct TwoStageSearchAndTrainStep {
    name: String,
    importance: Option<PermutationImportanceStep>,
    first_stage: Option<Box<dyn SearchEngine>>,
    second_stage: Option<Box<dyn SearchEngine>>,
    pseudo_rows: usize,
    estimator: Option<SharedEstimator>,
}

impl TwoStageSearchAndTrainStep {
    pub fn new(name: impl Into<String>, importance: Option<PermutationImportanceStep>) -> Self {
        Self {
            name: name.into(),
            importance,
            first_stage: None,
            second_stage: None,
            pseudo_rows: 0,
            estimator: None,
        }
    }

    pub fn first_stage_engine(&self) -> Option<&dyn SearchEngine> {
        self.first_stage.as_deref()
    }

    /// Present only when the second search ran
    pub fn second_stage_engine(&self) -> Option<&dyn SearchEngine> {
        self.second_stage.as_deref()
    }

    pub fn importance_step(&self) -> Option<&PermutationImportanceStep> {
        self.importance.as_ref()
    }

    /// Number of pseudo-labeled rows added to the training data
    pub fn pseudo_label_count(&self) -> usize {
        self.pseudo_rows
    }

    fn pseudo_label(
        &self,
        engine: &dyn SearchEngine,
        data: &Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Option<(DataFrame, Array1<f64>)>> {
        let options = ctx.options;
        let x_test = match &data.x_test {
            Some(x) if options.pseudo_labeling && ctx.task == TaskType::Binary => x,
            Some(_) if options.pseudo_labeling => {
                debug!(task = ?ctx.task, "pseudo-labeling skipped for non-binary task");
                return Ok(None);
            }
            _ => return Ok(None),
        };

        let size = if options.ensemble_size > 0 { options.ensemble_size } else { 10 };
        let ensemble = fit_greedy_ensemble(engine, data, ctx, size, false)?;
        let proba = ensemble.predict_proba(x_test)?;
        let classes = ensemble
            .classes()
            .ok_or_else(|| KolosalError::InvalidInput("ensemble has no class labels".to_string()))?;

        let selection = select_pseudo_labels(&proba, classes, options.pseudo_labeling_proba_threshold, ctx.task)?;
        info!(
            rows = selection.rows.len(),
            threshold = options.pseudo_labeling_proba_threshold,
            "pseudo-labeled test rows"
        );
        ctx.progress(&self.name, "pseudo labeling");
        if selection.rows.is_empty() {
            return Ok(None);
        }

        let x_pseudo = frame::take_rows(x_test, &selection.rows)?;
        Ok(Some((x_pseudo, selection.labels)))
    }

    fn merge_pseudo_labels(
        &self,
        data: Dataset,
        x_pseudo: &DataFrame,
        y_pseudo: &Array1<f64>,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        let options = ctx.options;
        let Dataset {
            x_train,
            y_train,
            x_test,
            x_eval,
            y_eval,
        } = data;

        if options.pseudo_labeling_resplit {
            let mut xs = vec![&x_train, x_pseudo];
            let mut ys = vec![&y_train, y_pseudo];
            if let (Some(xe), Some(ye)) = (&x_eval, &y_eval) {
                xs.push(xe);
                ys.push(ye);
            }
            let x_mix = frame::concat_rows(&xs)?;
            let y_mix = frame::concat_labels(&ys)?;
            let stratify = ctx.task.is_classification().then_some(&y_mix);
            let (x_train, x_eval, y_train, y_eval) =
                train_test_split(&x_mix, &y_mix, options.eval_size, options.random_state, stratify)?;
            debug!(train = x_train.height(), eval = x_eval.height(), "resplit with pseudo-labels");
            Ok(Dataset {
                x_train,
                y_train,
                x_test,
                x_eval: Some(x_eval),
                y_eval: Some(y_eval),
            })
        } else {
            let x_train = frame::concat_rows(&[&x_train, x_pseudo])?;
            let y_train = frame::concat_labels(&[&y_train, y_pseudo])?;
            debug!(train = x_train.height(), "appended pseudo-labels to train set");
            Ok(Dataset {
                x_train,
                y_train,
                x_test,
                x_eval,
                y_eval,
            })
        }
    }
}

impl ExperimentStep for TwoStageSearchAndTrainStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(
        &mut self,
        engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        let first = run_search(engine, &data, ctx, &self.name, "first stage search")?;
        let pseudo = self.pseudo_label(first.as_ref(), &data, ctx)?;

        let (mut data, unselected) = match self.importance.as_mut() {
            Some(pi) => {
                let data = pi.fit_transform(first.as_ref(), data, ctx)?;
                (data, pi.unselected_features().to_vec())
            }
            None => (data, Vec::new()),
        };

        let second = if !unselected.is_empty() || pseudo.is_some() {
            if let Some((x_pseudo, y_pseudo)) = pseudo {
                let x_pseudo = frame::select_columns(&x_pseudo, &frame::column_names(&data.x_train), &self.name)?;
                self.pseudo_rows = y_pseudo.len();
                data = self.merge_pseudo_labels(data, &x_pseudo, &y_pseudo, ctx)?;
                ctx.progress(&self.name, "merge pseudo labels");
            }
            Some(run_search(engine, &data, ctx, &self.name, "two stage search")?)
        } else {
            info!(step = %self.name, "skip pipeline search stage 2");
            None
        };

        let searched = second.as_deref().unwrap_or(first.as_ref());
        let estimator = final_train(searched, &data, ctx, &self.name)?;

        self.first_stage = Some(first);
        self.second_stage = second;
        self.estimator = Some(estimator);
        Ok(data)
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        if self.estimator.is_none() {
            return Err(KolosalError::not_fitted(&self.name));
        }
        match &self.importance {
            Some(pi) => pi.transform(x),
            None => Ok(x.clone()),
        }
    }

    fn estimator(&self) -> Option<SharedEstimator> {
        self.estimator.clone()
    }

    fn output(&self) -> Option<&serde_json::Value> {
        self.importance.as_ref().and_then(|pi| pi.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_partition() {
        let p = array![0.95, 0.5, 0.1, 0.8, 0.2, 0.85];
        let (pos, neg) = binary_pseudo_labels(p.view(), 0.8);
        assert_eq!(pos, vec![0, 5]);
        assert_eq!(neg, vec![2]);
    }

    #[test]
    fn test_binary_labels_follow_class_order() {
        let proba = array![[0.05, 0.95], [0.5, 0.5], [0.9, 0.1]];
        let selection = select_pseudo_labels(&proba, &[3.0, 7.0], 0.8, TaskType::Binary).unwrap();
        assert_eq!(selection.rows, vec![0, 2]);
        assert_eq!(selection.labels.to_vec(), vec![7.0, 3.0]);
    }

    #[test]
    fn test_multiclass_not_pseudo_labeled() {
        let proba = array![[0.9, 0.05, 0.05], [0.0, 0.1, 0.9]];
        assert!(matches!(
            select_pseudo_labels(&proba, &[0.0, 1.0, 2.0], 0.8, TaskType::Multiclass),
            Err(KolosalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let proba = array![[0.9, 0.1]];
        assert!(select_pseudo_labels(&proba, &[0.0, 1.0, 2.0], 0.8, TaskType::Binary).is_err());
        assert!(select_pseudo_labels(&proba, &[0.0, 1.0], 0.8, TaskType::Regression).is_err());
    }
}
