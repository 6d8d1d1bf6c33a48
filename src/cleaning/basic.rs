//! Default data cleaner

use super::{DataCleaner, DataCleanerConfig};
use crate::data::frame;
use crate::error::{KolosalError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CleanerState {
    columns: Vec<String>,
    dropped: Vec<String>,
    fill_values: Vec<(String, f64)>,
}

/// Rule-based cleaner: numeric normalization, column pruning and mean imputation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicDataCleaner {
    config: DataCleanerConfig,
    fitted: Option<CleanerState>,
}

impl BasicDataCleaner {
    pub fn new(config: DataCleanerConfig) -> Self {
        Self { config, fitted: None }
    }

    pub fn config(&self) -> &DataCleanerConfig {
        &self.config
    }

    /// Columns kept by the fitted cleaner, in input order
    pub fn columns(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|s| s.columns.as_slice())
    }

    /// Columns removed while fitting
    pub fn dropped_columns(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|s| s.dropped.as_slice())
    }

    /// Cast every numeric column to Float64; NaN (and inf when configured) become null
    fn normalize(&self, df: &DataFrame) -> Result<DataFrame> {
        let replace_inf = self.config.replace_inf_values;
        let mut out = df.clone();
        for col in df.get_columns() {
            if !frame::is_numeric_dtype(col.dtype()) {
                continue;
            }
            let series = col.as_materialized_series().cast(&DataType::Float64)?;
            let cleaned: Float64Chunked = series
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan() && (!replace_inf || x.is_finite())))
                .collect();
            out.with_column(cleaned.with_name(col.name().clone()).into_series())?;
        }
        Ok(out)
    }

    fn apply(&self, df: &DataFrame, state: &CleanerState) -> Result<DataFrame> {
        let mut out = frame::select_columns(df, &state.columns, "data_cleaner")?;
        for (name, value) in &state.fill_values {
            let filled: Float64Chunked = {
                let column = out
                    .column(name)
                    .map_err(|_| KolosalError::FeatureNotFound(name.clone()))?;
                column
                    .as_materialized_series()
                    .f64()?
                    .into_iter()
                    .map(|v| Some(v.unwrap_or(*value)))
                    .collect()
            };
            out.with_column(filled.with_name(name.as_str().into()).into_series())?;
        }
        Ok(out)
    }
}

impl DataCleaner for BasicDataCleaner {
    fn fit_transform(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<(DataFrame, Array1<f64>)> {
        frame::check_rows(x, y, "X_train")?;

        let (x, y) = if self.config.drop_label_nan_rows && y.iter().any(|v| v.is_nan()) {
            let keep: Vec<usize> = (0..y.len()).filter(|&i| !y[i].is_nan()).collect();
            debug!(dropped = y.len() - keep.len(), "dropping rows with missing label");
            (frame::take_rows(x, &keep)?, frame::take_labels(y, &keep))
        } else {
            (x.clone(), y.clone())
        };

        let x = self.normalize(&x)?;
        let height = x.height();

        let mut columns = Vec::new();
        let mut dropped = Vec::new();
        for col in x.get_columns() {
            let name = col.name().to_string();
            let series = col.as_materialized_series();
            let reason = if self.config.drop_columns.contains(&name) {
                Some("listed")
            } else if self.config.drop_constant_columns && series.n_unique()? <= 1 {
                Some("constant")
            } else if self.config.drop_idness_columns
                && matches!(series.dtype(), DataType::String)
                && height > 1
                && series.n_unique()? == height
            {
                Some("id-like")
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    debug!(column = %name, reason, "dropping column");
                    dropped.push(name);
                }
                None => columns.push(name),
            }
        }

        if columns.is_empty() {
            return Err(KolosalError::DataError(
                "no columns left after cleaning".to_string(),
            ));
        }

        let mut fill_values = Vec::new();
        if self.config.fill_numeric_nulls {
            for name in &columns {
                let series = x
                    .column(name)
                    .map_err(|_| KolosalError::FeatureNotFound(name.clone()))?
                    .as_materialized_series();
                if series.dtype() == &DataType::Float64 && series.null_count() > 0 {
                    let mean = series.f64()?.mean().unwrap_or(0.0);
                    fill_values.push((name.clone(), mean));
                }
            }
        }

        let state = CleanerState {
            columns,
            dropped,
            fill_values,
        };
        let out = self.apply(&x, &state)?;
        self.fitted = Some(state);
        Ok((out, y))
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let state = self
            .fitted
            .as_ref()
            .ok_or_else(|| KolosalError::not_fitted("data_cleaner"))?;
        let x = self.normalize(x)?;
        self.apply(&x, state)
    }

    fn name(&self) -> &str {
        "basic_data_cleaner"
    }
}
