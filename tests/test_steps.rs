//! Integration tests for the individual experiment steps: column invariant,
//! transform replay and the unfitted guard

mod common;

use common::{binary_table, unlabeled_table, FakeSearchEngine};
use kolosal_experiment::cleaning::{BasicDataCleaner, DataCleanerConfig};
use kolosal_experiment::data::{frame, Dataset, TaskType};
use kolosal_experiment::drift::{CentroidAdversarialSplitter, KsDriftSelector};
use kolosal_experiment::experiment::{
    binary_pseudo_labels, DataCleanStep, DriftDetectStep, ExperimentOptions, ExperimentStep, MulticollinearityStep,
    PermutationImportanceStep, RecordingProgress, SearchAndTrainStep, StepContext, TwoStageSearchAndTrainStep,
};
use kolosal_experiment::feature_selection::{CorrelationLinkageSelector, PermutationImportanceEvaluator};
use kolosal_experiment::metrics::Scorer;
use kolosal_experiment::search::SearchEngine;
use kolosal_experiment::KolosalError;
use ndarray::Array1;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn narrowing_steps() -> Vec<Box<dyn ExperimentStep>> {
    vec![
        Box::new(DataCleanStep::new(
            "data_clean",
            Box::new(BasicDataCleaner::new(DataCleanerConfig::default())),
            Box::new(CentroidAdversarialSplitter::new()),
        )),
        Box::new(MulticollinearityStep::new(
            "select_by_multicollinearity",
            true,
            Box::new(CorrelationLinkageSelector::new(0.9)),
        )),
        Box::new(DriftDetectStep::new(
            "drift_detection",
            true,
            Box::new(KsDriftSelector::new(0.3, 0.3)),
        )),
    ]
}

fn assert_same_columns(data: &Dataset) {
    let expected = frame::column_names(&data.x_train);
    for df in [&data.x_eval, &data.x_test].into_iter().flatten() {
        assert_eq!(frame::column_names(df), expected);
    }
}

// ============================================================================
// Column invariant and replay
// ============================================================================

#[test]
fn test_columns_stay_aligned_after_every_step() {
    let (x, y) = binary_table(400, 1);
    let data = Dataset::new(x, y).with_test(unlabeled_table(200, 2));
    let options = ExperimentOptions::default();
    let progress = RecordingProgress::new();
    let ctx = StepContext {
        options: &options,
        task: TaskType::Binary,
        scorer: Scorer::NegLogLoss,
        progress: &progress,
    };
    let engine = FakeSearchEngine::new();

    let mut steps = narrowing_steps();
    let mut data = data;
    for step in steps.iter_mut() {
        data = step.fit_transform(&engine, data, &ctx).unwrap();
        assert_same_columns(&data);
        assert_eq!(data.x_train.height(), data.y_train.len());
    }

    assert!(data.x_train.width() <= 15);
    assert_eq!(progress.started_steps().first().map(String::as_str), Some("data_clean"));
    assert!(progress.last_output("select_by_multicollinearity").is_some());
}

#[test]
fn test_transform_is_repeatable() {
    let (x, y) = binary_table(300, 3);
    let options = ExperimentOptions::default();
    let progress = RecordingProgress::new();
    let ctx = StepContext {
        options: &options,
        task: TaskType::Binary,
        scorer: Scorer::NegLogLoss,
        progress: &progress,
    };
    let engine = FakeSearchEngine::new();

    let mut steps = narrowing_steps();
    let mut data = Dataset::new(x, y).with_test(unlabeled_table(100, 4));
    for step in steps.iter_mut() {
        data = step.fit_transform(&engine, data, &ctx).unwrap();
    }

    let fresh = unlabeled_table(50, 5);
    for step in &steps {
        let first = step.transform(&fresh).unwrap();
        let second = step.transform(&fresh).unwrap();
        assert!(first.equals_missing(&second), "step {} is not repeatable", step.name());
    }
}

#[test]
fn test_transform_before_fit_fails() {
    let x = unlabeled_table(10, 6);
    let mut steps = narrowing_steps();
    steps.push(Box::new(PermutationImportanceStep::new(
        "pi",
        Box::new(PermutationImportanceEvaluator::new(1)),
        3,
        1e-5,
        2,
    )));
    steps.push(Box::new(SearchAndTrainStep::new("search")));
    steps.push(Box::new(TwoStageSearchAndTrainStep::new("two_stage", None)));

    for step in &steps {
        match step.transform(&x) {
            Err(KolosalError::ModelNotFitted { step: name }) => assert_eq!(name, step.name()),
            other => panic!("step {} returned {:?}", step.name(), other.map(|df| df.shape())),
        }
    }
}

#[test]
fn test_disabled_narrowing_is_identity() {
    let (x, y) = binary_table(100, 7);
    let options = ExperimentOptions::default();
    let progress = RecordingProgress::new();
    let ctx = StepContext {
        options: &options,
        task: TaskType::Binary,
        scorer: Scorer::NegLogLoss,
        progress: &progress,
    };
    let engine = FakeSearchEngine::new();

    let mut collinearity = MulticollinearityStep::new("mc", false, Box::new(CorrelationLinkageSelector::new(0.9)));
    let mut drift = DriftDetectStep::new("drift", true, Box::new(KsDriftSelector::new(0.3, 0.3)));

    let data = collinearity.fit_transform(&engine, Dataset::new(x.clone(), y), &ctx).unwrap();
    // no test set, so drift detection is skipped
    let data = drift.fit_transform(&engine, data, &ctx).unwrap();

    assert!(data.x_train.equals(&x));
    assert!(collinearity.transform(&x).unwrap().equals(&x));
    assert!(drift.transform(&x).unwrap().equals(&x));
    assert!(progress.events().is_empty());
}

#[test]
fn test_mask_reports_missing_columns() {
    let (x, y) = binary_table(200, 8);
    let options = ExperimentOptions::default();
    let progress = RecordingProgress::new();
    let ctx = StepContext {
        options: &options,
        task: TaskType::Binary,
        scorer: Scorer::NegLogLoss,
        progress: &progress,
    };
    let engine = FakeSearchEngine::new();

    let mut step = MulticollinearityStep::new("mc", true, Box::new(CorrelationLinkageSelector::new(0.9)));
    step.fit_transform(&engine, Dataset::new(x, y), &ctx).unwrap();

    let narrow = df!("f0" => &[0.1, 0.2]).unwrap();
    assert!(matches!(step.transform(&narrow), Err(KolosalError::AlignmentError(_))));
}

// ============================================================================
// Importance step
// ============================================================================

#[test]
fn test_importance_step_needs_trials() {
    let (x, y) = binary_table(100, 9);
    let options = ExperimentOptions::default();
    let progress = RecordingProgress::new();
    let ctx = StepContext {
        options: &options,
        task: TaskType::Binary,
        scorer: Scorer::NegLogLoss,
        progress: &progress,
    };

    let mut step = PermutationImportanceStep::new("pi", Box::new(PermutationImportanceEvaluator::new(1)), 3, 1e-5, 2);
    let result = step.fit_transform(&FakeSearchEngine::new(), Dataset::new(x, y), &ctx);
    assert!(matches!(result, Err(KolosalError::InvalidInput(_))));
}

#[test]
fn test_importance_step_drops_noise_features() {
    let (x, y) = binary_table(600, 10);
    let (x_eval, y_eval) = binary_table(300, 11);
    let data = Dataset::new(x, y).with_eval(x_eval, y_eval);
    let options = ExperimentOptions::default();
    let progress = RecordingProgress::new();
    let ctx = StepContext {
        options: &options,
        task: TaskType::Binary,
        scorer: Scorer::NegLogLoss,
        progress: &progress,
    };

    let mut engine = FakeSearchEngine::new();
    engine
        .search(kolosal_experiment::search::SearchRequest {
            x_train: &data.x_train,
            y_train: &data.y_train,
            x_eval: data.x_eval.as_ref(),
            y_eval: data.y_eval.as_ref(),
            cv: false,
            num_folds: 3,
            eval_set: data.eval_pair(),
            options: &options.search,
        })
        .unwrap();

    let mut step = PermutationImportanceStep::new("pi", Box::new(PermutationImportanceEvaluator::new(1)), 3, 0.05, 3);
    let data = step.fit_transform(&engine, data, &ctx).unwrap();

    let selected = step.selected_features().unwrap();
    assert!(selected.contains(&"f0".to_string()));
    assert!(!step.unselected_features().is_empty());
    assert_eq!(frame::column_names(&data.x_train), selected);
    assert_same_columns(&data);
    assert_eq!(step.importances().unwrap().columns.len(), 20);
}

// ============================================================================
// Pseudo-label partition
// ============================================================================

#[test]
fn test_pseudo_label_partition_is_disjoint() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for &t in &[0.55, 0.7, 0.8, 0.95, 1.0] {
        let p: Array1<f64> = (0..500).map(|_| rng.gen_range(0.0..1.0)).collect();
        let (positive, negative) = binary_pseudo_labels(p.view(), t);

        assert!(positive.iter().all(|&i| p[i] > t));
        assert!(negative.iter().all(|&i| p[i] < 1.0 - t));
        assert!(positive.iter().all(|i| !negative.contains(i)));

        let labeled = positive.len() + negative.len();
        let dead_zone = p.iter().filter(|&&v| v >= 1.0 - t && v <= t).count();
        assert_eq!(labeled + dead_zone, p.len());
    }
}
