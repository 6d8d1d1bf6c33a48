//! Data-preparation step: cleaning and train/eval splitting

use super::config::SplitStrategy;
use super::step::{ExperimentStep, StepContext};
use crate::cleaning::DataCleaner;
use crate::data::{frame, train_test_split, Dataset};
use crate::drift::AdversarialSplitter;
use crate::error::{KolosalError, Result};
use crate::search::SearchEngine;
use polars::prelude::DataFrame;
use tracing::{debug, warn};

pub struct DataCleanStep {
    name: String,
    cleaner: Box<dyn DataCleaner>,
    splitter: Box<dyn AdversarialSplitter>,
    original_features: Option<Vec<String>>,
    output: Option<serde_json::Value>,
}

impl DataCleanStep {
    pub fn new(
        name: impl Into<String>,
        cleaner: Box<dyn DataCleaner>,
        splitter: Box<dyn AdversarialSplitter>,
    ) -> Self {
        Self {
            name: name.into(),
            cleaner,
            splitter,
            original_features: None,
            output: None,
        }
    }
}

impl ExperimentStep for DataCleanStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_transform(
        &mut self,
        _engine: &dyn SearchEngine,
        data: Dataset,
        ctx: &StepContext<'_>,
    ) -> Result<Dataset> {
        let name = self.name.clone();
        ctx.start(&name, "clean and split data");
        data.validate_rows()?;

        let options = ctx.options;
        let Dataset {
            mut x_train,
            mut y_train,
            x_test,
            mut x_eval,
            mut y_eval,
        } = data;

        // an eval set is meaningless under cross-validation
        if options.cv {
            if let (Some(xe), Some(ye)) = (x_eval.take(), y_eval.take()) {
                x_train = frame::concat_rows(&[&x_train, &xe])?;
                y_train = frame::concat_labels(&[&y_train, &ye])?;
                debug!(rows = x_train.height(), "folded eval set into training set");
            }
        }

        let (x_train, y_train) = self.cleaner.fit_transform(&x_train, &y_train)?;
        ctx.progress(&name, "fit_transform train set");

        let x_test = match x_test {
            Some(x) => {
                let x = self.cleaner.transform(&x)?;
                ctx.progress(&name, "transform X_test");
                Some(x)
            }
            None => None,
        };

        let (x_train, y_train, x_eval, y_eval) = if options.cv {
            (x_train, y_train, None, None)
        } else {
            match (x_eval, y_eval) {
                (Some(xe), Some(ye)) => {
                    let (xe, ye) = self.cleaner.transform_labeled(&xe, &ye)?;
                    ctx.progress(&name, "transform eval set");
                    (x_train, y_train, Some(xe), Some(ye))
                }
                _ => {
                    let adversarial = options.train_test_split_strategy == SplitStrategy::AdversarialValidation;
                    let (xt, xe, yt, ye) = match (&x_test, adversarial) {
                        (Some(test), true) => {
                            debug!("adversarial train/eval split");
                            self.splitter.fit(&x_train, test)?;
                            self.splitter.train_test_split(&x_train, &y_train, options.eval_size)?
                        }
                        _ => {
                            if adversarial {
                                warn!("adversarial validation needs a test set, using a random split");
                            }
                            let stratify = ctx.task.is_classification().then_some(&y_train);
                            train_test_split(
                                &x_train,
                                &y_train,
                                options.eval_size,
                                options.random_state,
                                stratify,
                            )?
                        }
                    };
                    ctx.progress(&name, "split into train set and eval set");
                    (xt, yt, Some(xe), Some(ye))
                }
            }
        };

        let data = Dataset {
            x_train,
            y_train,
            x_test,
            x_eval,
            y_eval,
        };
        data.validate_rows()?;
        data.validate_columns()?;

        let output = data.shape_summary();
        ctx.end(&name, output.clone());
        self.original_features = Some(frame::column_names(&data.x_train));
        self.output = Some(output);
        Ok(data)
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        if self.original_features.is_none() {
            return Err(KolosalError::not_fitted(&self.name));
        }
        self.cleaner.transform(x)
    }

    fn original_features(&self) -> Option<&[String]> {
        self.original_features.as_deref()
    }

    fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }
}
