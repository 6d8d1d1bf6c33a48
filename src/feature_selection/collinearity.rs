//! Correlation-linkage multicollinearity selection

use super::{CollinearitySelection, CollinearitySelector, LinkageMerge};
use crate::data::frame;
use crate::error::Result;
use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Average ranks, ties share the mean rank
fn rank(values: ArrayView1<f64>) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        sum_xy / denom
    }
}

/// Spearman rank correlation matrix of the columns of `data`.
///
/// Missing values are replaced by the column mean before ranking.
pub fn spearman_correlation(data: &Array2<f64>) -> Array2<f64> {
    let ranks: Vec<Vec<f64>> = data
        .axis_iter(Axis(1))
        .map(|col| {
            let present: Vec<f64> = col.iter().copied().filter(|v| !v.is_nan()).collect();
            let mean = if present.is_empty() {
                0.0
            } else {
                present.iter().sum::<f64>() / present.len() as f64
            };
            let filled = col.mapv(|v| if v.is_nan() { mean } else { v });
            rank(filled.view())
        })
        .collect();

    let k = ranks.len();
    let mut corr = Array2::<f64>::eye(k);
    for i in 0..k {
        for j in (i + 1)..k {
            let r = pearson(&ranks[i], &ranks[j]);
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

/// Average-linkage clustering over a distance matrix; returns all `n-1` merges
fn average_linkage(distance: &Array2<f64>) -> Vec<LinkageMerge> {
    let n = distance.nrows();
    let mut clusters: Vec<(usize, Vec<usize>)> = (0..n).map(|i| (i, vec![i])).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while clusters.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let (ma, mb) = (&clusters[a].1, &clusters[b].1);
                let total: f64 = ma
                    .iter()
                    .flat_map(|&i| mb.iter().map(move |&j| (i, j)))
                    .map(|(i, j)| distance[[i, j]])
                    .sum();
                let avg = total / (ma.len() * mb.len()) as f64;
                if avg < best.2 {
                    best = (a, b, avg);
                }
            }
        }

        let (a, b, d) = best;
        let (id_b, members_b) = clusters.remove(b);
        let (id_a, members_a) = clusters.remove(a);
        let mut members = members_a;
        members.extend(members_b);
        merges.push(LinkageMerge {
            left: id_a,
            right: id_b,
            distance: d,
            size: members.len(),
        });
        clusters.push((n + merges.len() - 1, members));
    }
    merges
}

/// Groups numeric features whose absolute Spearman correlation reaches
/// `threshold` and keeps the first feature of every group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationLinkageSelector {
    pub threshold: f64,
}

impl Default for CorrelationLinkageSelector {
    fn default() -> Self {
        Self { threshold: 0.9 }
    }
}

impl CorrelationLinkageSelector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs().min(1.0),
        }
    }
}

impl CollinearitySelector for CorrelationLinkageSelector {
    fn select(&self, x: &DataFrame) -> Result<CollinearitySelection> {
        let all = frame::column_names(x);
        let numeric = frame::numeric_columns(x);
        if numeric.len() < 2 {
            return Ok(CollinearitySelection {
                linkage: Vec::new(),
                kept: all,
                dropped: Vec::new(),
            });
        }

        let data = frame::columns_to_array2(x, &numeric)?;
        let distance = spearman_correlation(&data).mapv(|r| 1.0 - r.abs());
        let linkage = average_linkage(&distance);

        // Flat clusters at the cut; average linkage never produces inversions
        let cut = 1.0 - self.threshold;
        let n = numeric.len();
        let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut flat: Vec<Vec<usize>> = Vec::new();
        let mut active: HashSet<usize> = (0..n).collect();
        for (k, merge) in linkage.iter().enumerate() {
            if merge.distance > cut + 1e-12 {
                break;
            }
            let mut joined = std::mem::take(&mut members[merge.left]);
            joined.extend(std::mem::take(&mut members[merge.right]));
            active.remove(&merge.left);
            active.remove(&merge.right);
            active.insert(n + k);
            members.push(joined);
        }
        for id in active {
            flat.push(std::mem::take(&mut members[id]));
        }

        let mut dropped_numeric: HashSet<&str> = HashSet::new();
        for cluster in &flat {
            if let Some(&keep) = cluster.iter().min() {
                for &i in cluster {
                    if i != keep {
                        dropped_numeric.insert(numeric[i].as_str());
                    }
                }
            }
        }

        let (dropped, kept): (Vec<String>, Vec<String>) = all
            .into_iter()
            .partition(|name| dropped_numeric.contains(name.as_str()));
        debug!(kept = kept.len(), dropped = dropped.len(), "correlation linkage selection");

        Ok(CollinearitySelection {
            linkage,
            kept,
            dropped,
        })
    }
}
