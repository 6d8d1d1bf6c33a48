//! Permutation feature importance

use super::{ImportanceEvaluator, ImportanceResult};
use crate::data::{frame, TaskType};
use crate::error::{KolosalError, Result};
use crate::metrics::{evaluate, Scorer};
use crate::model::Estimator;
use ndarray::Array1;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Shuffles one column at a time and measures the score drop.
///
/// Importance of a column is `baseline - permuted` under the scorer, so
/// larger means more important. Statistics are taken over every
/// `(estimator, repeat)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationImportanceEvaluator {
    pub seed: u64,
}

impl Default for PermutationImportanceEvaluator {
    fn default() -> Self {
        Self { seed: 9527 }
    }
}

impl PermutationImportanceEvaluator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Score drops of one column over every estimator and repeat
    #[allow(clippy::too_many_arguments)]
    fn column_drops(
        &self,
        column_idx: usize,
        name: &str,
        estimators: &[Box<dyn Estimator>],
        baselines: &[f64],
        x: &DataFrame,
        y: &Array1<f64>,
        scorer: Scorer,
        task: TaskType,
        n_repeats: usize,
    ) -> Result<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(column_idx as u64));
        let source = x
            .column(name)
            .map_err(|_| KolosalError::FeatureNotFound(name.to_string()))?
            .as_materialized_series()
            .clone();

        let mut drops = Vec::with_capacity(estimators.len() * n_repeats);
        let mut order: Vec<IdxSize> = (0..x.height() as IdxSize).collect();
        for _ in 0..n_repeats {
            order.shuffle(&mut rng);
            let idx = IdxCa::from_vec("idx".into(), order.clone());
            let mut permuted = x.clone();
            permuted.with_column(source.take(&idx)?)?;

            for (estimator, baseline) in estimators.iter().zip(baselines) {
                let score = evaluate(estimator.as_ref(), &permuted, y, scorer, task)?;
                drops.push(baseline - score);
            }
        }
        Ok(drops)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

impl ImportanceEvaluator for PermutationImportanceEvaluator {
    fn evaluate(
        &self,
        estimators: &[Box<dyn Estimator>],
        x: &DataFrame,
        y: &Array1<f64>,
        scorer: Scorer,
        task: TaskType,
        n_repeats: usize,
    ) -> Result<ImportanceResult> {
        if estimators.is_empty() {
            return Err(KolosalError::InvalidInput(
                "permutation importance needs at least one estimator".to_string(),
            ));
        }
        frame::check_rows(x, y, "X_eval")?;
        let n_repeats = n_repeats.max(1);

        let baselines = estimators
            .iter()
            .map(|est| evaluate(est.as_ref(), x, y, scorer, task))
            .collect::<Result<Vec<f64>>>()?;

        let columns = frame::column_names(x);
        let stats = columns
            .par_iter()
            .enumerate()
            .map(|(i, name)| {
                self.column_drops(i, name, estimators, &baselines, x, y, scorer, task, n_repeats)
                    .map(|drops| mean_std(&drops))
            })
            .collect::<Result<Vec<(f64, f64)>>>()?;

        let (importances_mean, importances_std) = stats.into_iter().unzip();
        Ok(ImportanceResult {
            columns,
            importances_mean,
            importances_std,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Regressor that returns column `a` as its prediction
    struct CopyA;

    impl Estimator for CopyA {
        fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
            Ok(Array1::from(frame::column_to_f64(x, "a")?))
        }
    }

    #[test]
    fn test_used_feature_is_important() {
        let x = df!(
            "a" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            "noise" => &[0.3, 0.1, 0.4, 0.1, 0.5, 0.9, 0.2, 0.6]
        )
        .unwrap();
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let estimators: Vec<Box<dyn Estimator>> = vec![Box::new(CopyA)];

        let result = PermutationImportanceEvaluator::new(1)
            .evaluate(&estimators, &x, &y, Scorer::NegMeanSquaredError, TaskType::Regression, 5)
            .unwrap();

        assert_eq!(result.columns, vec!["a", "noise"]);
        assert!(result.importances_mean[0] > 1.0);
        assert_eq!(result.importances_mean[1], 0.0);
        assert_eq!(result.importances_std[1], 0.0);
    }

    #[test]
    fn test_no_estimators_fails() {
        let x = df!("a" => &[1.0]).unwrap();
        let result = PermutationImportanceEvaluator::default().evaluate(
            &[],
            &x,
            &array![1.0],
            Scorer::R2,
            TaskType::Regression,
            5,
        );
        assert!(result.is_err());
    }
}
