//! DataFrame helpers shared by the experiment steps
//!
//! Every helper reports misaligned inputs as [`KolosalError::AlignmentError`]
//! instead of letting polars fail with a generic column/index error.

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashSet;

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Whether a dtype holds plain numbers
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Names of the numeric columns of a frame, in order
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Select `features` from `df` in the given order.
///
/// Fails with an alignment error naming every missing column.
pub fn select_columns(df: &DataFrame, features: &[String], context: &str) -> Result<DataFrame> {
    let present: HashSet<String> = column_names(df).into_iter().collect();
    let missing: Vec<&str> = features
        .iter()
        .filter(|f| !present.contains(*f))
        .map(|f| f.as_str())
        .collect();

    if !missing.is_empty() {
        return Err(KolosalError::AlignmentError(format!(
            "{}: frame is missing expected columns {:?}",
            context, missing
        )));
    }

    Ok(df.select(features.iter().map(|f| f.as_str()))?)
}

/// Stack frames vertically. All frames must carry the same column list.
pub fn concat_rows(frames: &[&DataFrame]) -> Result<DataFrame> {
    let (first, rest) = frames
        .split_first()
        .ok_or_else(|| KolosalError::InvalidInput("no frames to concatenate".to_string()))?;

    let expected = column_names(first);
    let mut out = (*first).clone();
    for (i, frame) in rest.iter().enumerate() {
        let names = column_names(frame);
        if names != expected {
            return Err(KolosalError::AlignmentError(format!(
                "cannot concatenate frame {} with columns {:?} onto columns {:?}",
                i + 1,
                names,
                expected
            )));
        }
        out = out.vstack(frame)?;
    }
    Ok(out)
}

/// Stack label vectors in order
pub fn concat_labels(labels: &[&Array1<f64>]) -> Result<Array1<f64>> {
    let views: Vec<_> = labels.iter().map(|y| y.view()).collect();
    Ok(ndarray::concatenate(ndarray::Axis(0), &views)?)
}

/// Take rows by position
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let height = df.height();
    if let Some(&bad) = indices.iter().find(|&&i| i >= height) {
        return Err(KolosalError::AlignmentError(format!(
            "row index {} out of bounds for frame with {} rows",
            bad, height
        )));
    }
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Take label entries by position
pub fn take_labels(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    indices.iter().map(|&i| y[i]).collect()
}

/// Fail when a label vector does not line up with its frame
pub fn check_rows(df: &DataFrame, y: &Array1<f64>, what: &str) -> Result<()> {
    if df.height() != y.len() {
        return Err(KolosalError::AlignmentError(format!(
            "{} has {} rows but {} labels",
            what,
            df.height(),
            y.len()
        )));
    }
    Ok(())
}

/// Extract one column as `f64` values; nulls become NaN
pub fn column_to_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| KolosalError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Extract named numeric columns into a row-major matrix
pub fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data = names
        .iter()
        .map(|name| column_to_f64(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, names.len()), |(r, c)| col_data[c][r]))
}
