//! Kolmogorov-Smirnov drift feature selection

use super::{DriftFeatureSelector, DriftRound, DriftSelection};
use crate::data::frame;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Two-sample KS statistic: the largest gap between the empirical CDFs.
///
/// NaN values are ignored; an empty sample gives 0.
pub fn ks_statistic(reference: &[f64], test: &[f64]) -> f64 {
    let mut a: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut b: Vec<f64> = test.iter().copied().filter(|v| !v.is_nan()).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }
    d
}

/// Total variation distance between the value frequencies of two columns
fn category_distance(reference: &Series, test: &Series) -> Result<f64> {
    fn frequencies(series: &Series) -> Result<HashMap<Option<String>, f64>> {
        let strings = series.cast(&DataType::String)?;
        let mut counts: HashMap<Option<String>, f64> = HashMap::new();
        for value in strings.str()?.into_iter() {
            *counts.entry(value.map(|s| s.to_string())).or_insert(0.0) += 1.0;
        }
        let total = series.len().max(1) as f64;
        counts.values_mut().for_each(|c| *c /= total);
        Ok(counts)
    }

    let p = frequencies(reference)?;
    let q = frequencies(test)?;
    let mut distance = 0.0;
    for (key, pv) in &p {
        distance += (pv - q.get(key).copied().unwrap_or(0.0)).abs();
    }
    for (key, qv) in &q {
        if !p.contains_key(key) {
            distance += qv;
        }
    }
    Ok(distance / 2.0)
}

/// Rejects the most drifted features while their score exceeds a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KsDriftSelector {
    /// Features scoring above this are considered drifted
    pub threshold: f64,
    /// Upper bound on the share of features that may be removed
    pub max_remove_ratio: f64,
}

impl Default for KsDriftSelector {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            max_remove_ratio: 0.3,
        }
    }
}

impl KsDriftSelector {
    pub fn new(threshold: f64, max_remove_ratio: f64) -> Self {
        Self {
            threshold,
            max_remove_ratio,
        }
    }

    fn feature_score(x_train: &DataFrame, x_test: &DataFrame, name: &str) -> Result<f64> {
        let train = x_train
            .column(name)
            .map_err(|_| KolosalError::FeatureNotFound(name.to_string()))?;
        let test = x_test.column(name).map_err(|_| {
            KolosalError::AlignmentError(format!("X_test is missing training column '{}'", name))
        })?;

        if frame::is_numeric_dtype(train.dtype()) && frame::is_numeric_dtype(test.dtype()) {
            let a = frame::column_to_f64(x_train, name)?;
            let b = frame::column_to_f64(x_test, name)?;
            Ok(ks_statistic(&a, &b))
        } else {
            category_distance(train.as_materialized_series(), test.as_materialized_series())
        }
    }
}

impl DriftFeatureSelector for KsDriftSelector {
    fn select(&self, x_train: &DataFrame, x_test: &DataFrame) -> Result<DriftSelection> {
        let names = frame::column_names(x_train);
        let scores = names
            .par_iter()
            .map(|name| Self::feature_score(x_train, x_test, name))
            .collect::<Result<Vec<f64>>>()?;

        let max_remove = ((names.len() as f64 * self.max_remove_ratio).floor() as usize)
            .min(names.len().saturating_sub(1));

        let mut removed = vec![false; names.len()];
        let mut history = Vec::new();
        while history.len() < max_remove {
            let worst = scores
                .iter()
                .enumerate()
                .filter(|(i, _)| !removed[*i])
                .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
                    Some((_, b)) if b >= s => best,
                    _ => Some((i, s)),
                });

            match worst {
                Some((i, score)) if score > self.threshold => {
                    removed[i] = true;
                    history.push(DriftRound {
                        removed: names[i].clone(),
                        score,
                        remaining: names.len() - history.len() - 1,
                    });
                    debug!(feature = %names[i], score, "rejecting drifted feature");
                }
                _ => break,
            }
        }

        let features = names
            .iter()
            .zip(&removed)
            .filter(|(_, r)| !**r)
            .map(|(n, _)| n.clone())
            .collect();

        Ok(DriftSelection {
            features,
            history,
            scores: names.into_iter().zip(scores).collect(),
        })
    }
}
