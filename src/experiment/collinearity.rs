//! Multicollinearity elimination step

use super::step::{apply_mask, ExperimentStep, FeatureMask, StepContext};
use crate::data::Dataset;
use crate::error::Result;
use crate::feature_selection::{CollinearitySelection, CollinearitySelector};
use crate::search::SearchEngine;
use polars::prelude::DataFrame;
use serde_json::json;

pub struct MulticollinearityStep {
    name: String,
    enabled: bool,
    selector: Box<dyn CollinearitySelector>,
    mask: Option<FeatureMask>,
    selection: Option<CollinearitySelection>,
    output: Option<serde_json::Value>,
}

impl MulticollinearityStep {
    pub fn new(name: impl Into<String>, enabled: bool, selector: Box<dyn CollinearitySelector>) -> Self {
        Self {
            name: name.into(),
            enabled,
            selector,
            mask: None,
            selection: None,
            output: None,
        }
    }

    pub fn selection(&self) -> Option<&CollinearitySelection> {
        self.selection.as_ref()
    }
}

impl ExperimentStep for MulticollinearityStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(
        &mut self,
        _engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        if !self.enabled {
            self.mask = Some(FeatureMask::Passthrough);
            return Ok(data);
        }

        ctx.start(&self.name, "drop features with multicollinearity");
        let selection = self.selector.select(&data.x_train)?;
        ctx.progress(&self.name, "calc correlation");

        let data = data.select_features(&selection.kept, &self.name)?;
        ctx.progress(&self.name, "drop features");

        let output = json!({
            "corr_linkage": selection.linkage,
            "remained": selection.kept,
            "dropped": selection.dropped,
        });
        ctx.end(&self.name, output.clone());

        self.mask = Some(FeatureMask::Columns(selection.kept.clone()));
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
