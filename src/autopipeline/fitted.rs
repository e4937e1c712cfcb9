//! A resolved pipeline fitted on training data

use super::pipeline::PipelinePlan;
use crate::data::ColumnRoleSet;
use crate::error::{AutoMlError, Result};
use crate::optimizer::TrialParams;
use crate::preprocessing::FittedFeaturizer;
use crate::training::{BinaryClassificationMetrics, TrainedClassifier, TrainerConfig};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Probability at or above which a passenger is predicted to survive
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Featurizer plus classifier, both fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    /// e.g. `featurize > lightgbm`
    pub description: String,
    pub params: TrialParams,
    pub roles: ColumnRoleSet,
    pub featurizer: FittedFeaturizer,
    pub trainer: TrainerConfig,
    pub classifier: TrainedClassifier,
    pub threshold: f64,
}

impl FittedPipeline {
    pub fn fit(plan: &PipelinePlan, train: &DataFrame, roles: &ColumnRoleSet, seed: u64) -> Result<Self> {
        let start = Instant::now();
        let label = label_name(roles)?;
        let y = label_values(train, label)?;

        let featurizer = FittedFeaturizer::fit(train, roles, plan.featurizer_options()?)?;
        let x = featurizer.transform(train)?;
        let trainer = plan.trainer_config()?;
        let classifier = trainer.fit(&x, &y, seed)?;

        debug!(
            pipeline = %plan.describe(),
            rows = x.nrows(),
            features = x.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline fitted"
        );

        Ok(Self {
            description: plan.describe(),
            params: plan.params.clone(),
            roles: roles.clone(),
            featurizer,
            trainer,
            classifier,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    /// Positive-class probability for each row of a conformed frame
    pub fn predict_proba(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.featurizer.transform(df)?;
        self.classifier.predict_proba(&x)
    }

    /// Raw margin for each row of a conformed frame
    pub fn decision_function(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.featurizer.transform(df)?;
        self.classifier.decision_function(&x)
    }

    /// Score a labeled, conformed frame
    pub fn evaluate(&self, df: &DataFrame) -> Result<BinaryClassificationMetrics> {
        let y = label_values(df, label_name(&self.roles)?)?;
        let proba = self.predict_proba(df)?;
        BinaryClassificationMetrics::compute(&y, &proba, self.threshold)
    }
}

fn label_name(roles: &ColumnRoleSet) -> Result<&str> {
    roles
        .label_column()
        .ok_or_else(|| AutoMlError::ConfigurationError("no label column in column roles".to_string()))
}

/// 0/1 label values of a conformed frame
pub fn label_values(df: &DataFrame, label: &str) -> Result<Array1<f64>> {
    let column = df
        .column(label)
        .map_err(|_| AutoMlError::FeatureNotFound(label.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| AutoMlError::DataLoadError(format!("missing label '{}' in row {}", label, row)))
        })
        .collect()
}
