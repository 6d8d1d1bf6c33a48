//! Drift-based feature rejection step

use super::step::{apply_mask, ExperimentStep, FeatureMask, StepContext};
use crate::data::Dataset;
use crate::drift::{DriftFeatureSelector, DriftSelection};
use crate::error::Result;
use crate::search::SearchEngine;
use polars::prelude::DataFrame;
use serde_json::json;
use tracing::debug;

pub struct DriftDetectStep {
    name: String,
    enabled: bool,
    selector: Box<dyn DriftFeatureSelector>,
    mask: Option<FeatureMask>,
    selection: Option<DriftSelection>,
    output: Option<serde_json::Value>,
}

impl DriftDetectStep {
    pub fn new(name: impl Into<String>, enabled: bool, selector: Box<dyn DriftFeatureSelector>) -> Self {
        Self {
            name: name.into(),
            enabled,
            selector,
            mask: None,
            selection: None,
            output: None,
        }
    }

    pub fn selection(&self) -> Option<&DriftSelection> {
        self.selection.as_ref()
    }
}

impl ExperimentStep for DriftDetectStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(
        &mut self,
        _engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        let selection = match (&data.x_test, self.enabled) {
            (Some(x_test), true) => {
                ctx.start(&self.name, "detect drifting");
                self.selector.select(&data.x_train, x_test)?
            }
            _ => {
                debug!(step = %self.name, "drift detection skipped");
                self.mask = Some(FeatureMask::Passthrough);
                return Ok(data);
            }
        };

        let data = data.select_features(&selection.features, &self.name)?;

        let output = json!({
            "no_drift_features": selection.features,
            "history": selection.history,
            "scores": selection.scores,
        });
        ctx.end(&self.name, output.clone());

        self.mask = Some(FeatureMask::Columns(selection.features.clone()));
        self.selection = Some(selection);
        self.output = Some(output);
        Ok(data)
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        apply_mask(&self.name, self.mask.as_ref(), x)
    }

    fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }
}
