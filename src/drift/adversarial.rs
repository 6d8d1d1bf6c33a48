//! Adversarial-validation style train/eval splitting

use super::AdversarialSplitter;
use crate::data::frame;
use crate::data::split::n_test_rows;
use crate::data::SplitParts;
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CentroidModel {
    columns: Vec<String>,
    mean: Array1<f64>,
    scale: Array1<f64>,
    /// Test centroid in standardized units
    centroid: Array1<f64>,
}

/// Puts the training rows closest to the test centroid into the eval set.
///
/// Numeric features are standardized with training statistics; missing
/// values sit at the training mean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CentroidAdversarialSplitter {
    model: Option<CentroidModel>,
}

impl CentroidAdversarialSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn standardized(model: &CentroidModel, df: &DataFrame) -> Result<ndarray::Array2<f64>> {
        let mut data = frame::columns_to_array2(df, &model.columns)?;
        for (j, mut col) in data.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (model.mean[j], model.scale[j]);
            col.mapv_inplace(|v| if v.is_nan() { 0.0 } else { (v - mean) / scale });
        }
        Ok(data)
    }
}

fn nan_mean_std(values: ndarray::ArrayView1<f64>) -> (f64, f64) {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return (0.0, 1.0);
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    (mean, if std > 0.0 { std } else { 1.0 })
}

impl AdversarialSplitter for CentroidAdversarialSplitter {
    fn fit(&mut self, x_train: &DataFrame, x_test: &DataFrame) -> Result<()> {
        let columns = frame::numeric_columns(x_train);
        if columns.is_empty() {
            return Err(KolosalError::InvalidInput(
                "adversarial split needs at least one numeric feature".to_string(),
            ));
        }

        let train = frame::columns_to_array2(x_train, &columns)?;
        let (mean, scale): (Vec<f64>, Vec<f64>) = train
            .axis_iter(Axis(1))
            .map(nan_mean_std)
            .unzip();

        let mut model = CentroidModel {
            columns,
            mean: Array1::from(mean),
            scale: Array1::from(scale),
            centroid: Array1::zeros(0),
        };
        let test = Self::standardized(&model, x_test)?;
        model.centroid = test
            .mean_axis(Axis(0))
            .ok_or_else(|| KolosalError::InvalidInput("X_test has no rows".to_string()))?;

        debug!(features = model.columns.len(), "fitted adversarial splitter");
        self.model = Some(model);
        Ok(())
    }

    fn train_test_split(&self, x: &DataFrame, y: &Array1<f64>, test_size: f64) -> Result<SplitParts> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| KolosalError::not_fitted("adversarial_splitter"))?;
        frame::check_rows(x, y, "X_train")?;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(KolosalError::InvalidInput(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        let n = x.height();
        if n < 2 {
            return Err(KolosalError::InvalidInput(format!(
                "need at least 2 samples to split, got {}",
                n
            )));
        }

        let data = Self::standardized(model, x)?;
        let distances: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|row| (&row - &model.centroid).mapv(|d| d * d).sum())
            .collect();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| distances[a].partial_cmp(&distances[b]).unwrap_or(Ordering::Equal));

        let n_eval = n_test_rows(n, test_size);
        let mut eval_idx = order[..n_eval].to_vec();
        let mut train_idx = order[n_eval..].to_vec();
        eval_idx.sort_unstable();
        train_idx.sort_unstable();

        Ok((
            frame::take_rows(x, &train_idx)?,
            frame::take_rows(x, &eval_idx)?,
            frame::take_labels(y, &train_idx),
            frame::take_labels(y, &eval_idx),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use polars::prelude::*;

    #[test]
    fn test_eval_rows_resemble_test_set() {
        let train = df!(
            "a" => &[0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0, 4.0, 5.0],
            "b" => &["x", "y", "x", "y", "x", "y", "x", "y", "x", "y"]
        )
        .unwrap();
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let test = df!("a" => &[11.0, 12.0, 12.5], "b" => &["x", "x", "y"]).unwrap();

        let mut splitter = CentroidAdversarialSplitter::new();
        splitter.fit(&train, &test).unwrap();
        let (x_tr, x_ev, y_tr, y_ev) = splitter.train_test_split(&train, &y, 0.3).unwrap();

        assert_eq!(x_ev.height(), 3);
        assert_eq!(x_tr.height(), 7);
        assert_eq!(y_tr.len(), 7);
        assert_eq!(y_ev.len(), 3);
        assert_eq!(frame::column_to_f64(&x_ev, "a").unwrap(), vec![11.0, 12.0, 13.0]);
        assert_eq!(frame::column_names(&x_ev), vec!["a", "b"]);
    }

    #[test]
    fn test_split_before_fit_fails() {
        let x = df!("a" => &[1.0, 2.0]).unwrap();
        let splitter = CentroidAdversarialSplitter::new();
        assert!(splitter.train_test_split(&x, &array![0.0, 1.0], 0.5).is_err());
    }
}
