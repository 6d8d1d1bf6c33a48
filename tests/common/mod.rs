//! Shared fixtures: a scripted search engine, a nearest-centroid classifier
//! and synthetic tables

#![allow(dead_code)]

use kolosal_experiment::data::frame;
use kolosal_experiment::metrics::{unique_classes, Predictions, Scorer};
use kolosal_experiment::model::Estimator;
use kolosal_experiment::search::{rank_trials, OutOfFold, SearchEngine, SearchRequest, Trial};
use kolosal_experiment::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Estimator
// ============================================================================

/// Softmax over negative squared distances to the per-class centroids
#[derive(Debug, Clone)]
pub struct CentroidModel {
    columns: Vec<String>,
    classes: Vec<f64>,
    centroids: Array2<f64>,
    temperature: f64,
}

impl CentroidModel {
    pub fn fit(x: &DataFrame, y: &Array1<f64>, temperature: f64) -> Result<Self> {
        let columns = frame::numeric_columns(x);
        let data = frame::columns_to_array2(x, &columns)?;
        let classes = unique_classes(y);

        let mut centroids = Array2::zeros((classes.len(), columns.len()));
        for (c, class) in classes.iter().enumerate() {
            let rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == *class).collect();
            let members = data.select(Axis(0), &rows);
            if let Some(mean) = members.mean_axis(Axis(0)) {
                centroids.row_mut(c).assign(&mean);
            }
        }

        Ok(Self {
            columns,
            classes,
            centroids,
            temperature,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Estimator for CentroidModel {
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(Predictions::Probabilities {
            proba,
            classes: self.classes.clone(),
        }
        .to_labels())
    }

    fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let data = frame::columns_to_array2(x, &self.columns)?;
        let mut proba = Array2::zeros((data.nrows(), self.classes.len()));
        for (r, row) in data.rows().into_iter().enumerate() {
            let logits: Vec<f64> = self
                .centroids
                .rows()
                .into_iter()
                .map(|c| -(&row - &c).mapv(|v| v * v).sum() / self.temperature)
                .collect();
            let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let total: f64 = logits.iter().map(|l| (l - max).exp()).sum();
            for (c, l) in logits.iter().enumerate() {
                proba[[r, c]] = (l - max).exp() / total;
            }
        }
        Ok(proba)
    }

    fn classes(&self) -> Option<&[f64]> {
        Some(&self.classes)
    }

    fn name(&self) -> &str {
        "centroid"
    }
}

// ============================================================================
// Search engine
// ============================================================================

/// What one `search` call received
#[derive(Debug, Clone)]
pub struct SearchRecord {
    pub train_rows: usize,
    pub eval_rows: Option<usize>,
    pub columns: Vec<String>,
    pub cv: bool,
}

/// Fits one centroid model per temperature on every search call.
///
/// Forks copy the trials and share the call log, so a test can count the
/// searches an experiment ran.
#[derive(Clone)]
pub struct FakeSearchEngine {
    temperatures: Vec<f64>,
    trials: Vec<Trial>,
    models: HashMap<String, CentroidModel>,
    log: Arc<Mutex<Vec<SearchRecord>>>,
    retrains: Arc<Mutex<usize>>,
    fail_search: bool,
}

impl FakeSearchEngine {
    pub fn new() -> Self {
        Self {
            temperatures: vec![0.25, 0.5, 1.0],
            trials: Vec::new(),
            models: HashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            retrains: Arc::new(Mutex::new(0)),
            fail_search: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_search: true,
            ..Self::new()
        }
    }

    pub fn searches(&self) -> Vec<SearchRecord> {
        self.log.lock().clone()
    }

    pub fn search_count(&self) -> usize {
        self.log.lock().len()
    }

    pub fn retrain_count(&self) -> usize {
        *self.retrains.lock()
    }

    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    fn out_of_fold(x: &DataFrame, y: &Array1<f64>, folds: usize, temperature: f64) -> Result<Array2<f64>> {
        let classes = unique_classes(y);
        let mut oof = Array2::zeros((y.len(), classes.len()));
        for fold in 0..folds {
            let (held, kept): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|i| i % folds == fold);
            let model = CentroidModel::fit(
                &frame::take_rows(x, &kept)?,
                &frame::take_labels(y, &kept),
                temperature,
            )?;
            let proba = model.predict_proba(&frame::take_rows(x, &held)?)?;
            for (r, &i) in held.iter().enumerate() {
                oof.row_mut(i).assign(&proba.row(r));
            }
        }
        Ok(oof)
    }
}

impl SearchEngine for FakeSearchEngine {
    fn fork(&self) -> Box<dyn SearchEngine> {
        Box::new(self.clone())
    }

    fn search(&mut self, request: SearchRequest<'_>) -> Result<()> {
        if self.fail_search {
            return Err(KolosalError::collaborator("search engine", "scripted failure"));
        }

        let call = {
            let mut log = self.log.lock();
            log.push(SearchRecord {
                train_rows: request.x_train.height(),
                eval_rows: request.x_eval.map(|x| x.height()),
                columns: frame::column_names(request.x_train),
                cv: request.cv,
            });
            log.len()
        };

        let classes = unique_classes(request.y_train);
        for (k, &temperature) in self.temperatures.iter().enumerate() {
            let model = CentroidModel::fit(request.x_train, request.y_train, temperature)?;
            let model_file = format!("search-{}-trial-{}", call, k);

            let (reward, oof) = if request.cv {
                let oof = Self::out_of_fold(request.x_train, request.y_train, request.num_folds, temperature)?;
                let reward = Scorer::NegLogLoss.score(
                    request.y_train,
                    &Predictions::Probabilities {
                        proba: oof.clone(),
                        classes: classes.clone(),
                    },
                )?;
                let oof = if classes.len() == 2 {
                    OutOfFold::Vector(oof.column(1).to_owned())
                } else {
                    OutOfFold::Matrix(oof)
                };
                (reward, Some(oof))
            } else {
                let (x, y) = request.eval_set.unwrap_or((request.x_train, request.y_train));
                let reward = Scorer::NegLogLoss.score(
                    y,
                    &Predictions::Probabilities {
                        proba: model.predict_proba(x)?,
                        classes: classes.clone(),
                    },
                )?;
                (reward, None)
            };

            let mut trial = Trial::new(self.trials.len() + 1, reward, model_file.clone())
                .with_space_sample(json!({ "temperature": temperature }));
            if let Some(oof) = oof {
                trial = trial.with_oof(oof);
            }

            self.models.insert(model_file, model);
            self.trials.push(trial);
        }
        rank_trials(&mut self.trials);
        Ok(())
    }

    fn top_trials(&self, k: usize) -> Vec<&Trial> {
        self.trials.iter().take(k).collect()
    }

    fn load_estimator(&self, model_file: &str) -> Result<Box<dyn Estimator>> {
        self.models
            .get(model_file)
            .map(|m| Box::new(m.clone()) as Box<dyn Estimator>)
            .ok_or_else(|| KolosalError::collaborator("search engine", format!("unknown model {}", model_file)))
    }

    fn final_train(
        &self,
        space_sample: &serde_json::Value,
        x: &DataFrame,
        y: &Array1<f64>,
    ) -> Result<Box<dyn Estimator>> {
        *self.retrains.lock() += 1;
        let temperature = space_sample["temperature"].as_f64().unwrap_or(1.0);
        Ok(Box::new(CentroidModel::fit(x, y, temperature)?))
    }
}

// ============================================================================
// Data
// ============================================================================

pub const N_FEATURES: usize = 20;

/// Binary table with 20 uniform features.
///
/// `f10..f14` are noisy copies of `f0..f4` (five correlated pairs); the
/// label is the sign of `f0 + f1 + f2` plus a little noise.
pub fn binary_table(n_rows: usize, seed: u64) -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); N_FEATURES];
    let mut y = Vec::with_capacity(n_rows);

    for _ in 0..n_rows {
        let base: Vec<f64> = (0..10).map(|_| rng.gen_range(-1.0..1.0)).collect();
        for (j, v) in base.iter().enumerate() {
            columns[j].push(*v);
        }
        for j in 0..5 {
            columns[10 + j].push(base[j] + rng.gen_range(-0.05..0.05));
        }
        for j in 15..N_FEATURES {
            columns[j].push(rng.gen_range(-1.0..1.0));
        }
        let signal = base[0] + base[1] + base[2] + rng.gen_range(-0.1..0.1);
        y.push(if signal > 0.0 { 1.0 } else { 0.0 });
    }

    let series: Vec<Column> = columns
        .into_iter()
        .enumerate()
        .map(|(j, values)| Column::new(format!("f{}", j).into(), values))
        .collect();
    let df = DataFrame::new(series).expect("valid frame");
    (df, Array1::from(y))
}

/// Feature table without labels, e.g. a test set
pub fn unlabeled_table(n_rows: usize, seed: u64) -> DataFrame {
    binary_table(n_rows, seed).0
}

/// Three well separated classes over five features; `f0` and `f1` carry the
/// class, the rest is noise
pub fn multiclass_table(n_rows: usize, seed: u64) -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); 5];
    let mut y = Vec::with_capacity(n_rows);

    for i in 0..n_rows {
        let class = (i % 3) as f64;
        columns[0].push(4.0 * class + rng.gen_range(-0.5..0.5));
        columns[1].push(-4.0 * class + rng.gen_range(-0.5..0.5));
        for column in columns.iter_mut().skip(2) {
            column.push(rng.gen_range(-1.0..1.0));
        }
        y.push(class);
    }

    let series: Vec<Column> = columns
        .into_iter()
        .enumerate()
        .map(|(j, values)| Column::new(format!("f{}", j).into(), values))
        .collect();
    let df = DataFrame::new(series).expect("valid frame");
    (df, Array1::from(y))
}
