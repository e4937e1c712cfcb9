//! Experiment configuration

use super::monitor::TrialMonitor;
use crate::autopipeline::PipelineNode;
use crate::data::{ColumnRole, ColumnRoleSet, TrainTestData};
use crate::error::{AutoMlError, Result};
use crate::optimizer::{OptimizeDirection, TunerStrategy};
use crate::training::BinaryClassificationMetric;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Immutable bundle of everything a run needs
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub pipeline: Arc<PipelineNode>,
    pub roles: Arc<ColumnRoleSet>,
    pub label_column: String,
    pub metric: BinaryClassificationMetric,
    pub time_budget: Duration,
    pub tuner: TunerStrategy,
    pub train_set: Arc<DataFrame>,
    pub validation_set: Arc<DataFrame>,
    pub monitor: Option<Arc<TrialMonitor>>,
    pub checkpoint_dir: Option<PathBuf>,
    pub max_concurrent_trials: usize,
    /// Stop after this many trials even if budget remains
    pub max_trials: Option<usize>,
    /// Overrides the context seed when set
    pub seed: Option<u64>,
}

impl ExperimentConfig {
    pub fn builder() -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::default()
    }

    pub fn direction(&self) -> OptimizeDirection {
        self.metric.direction()
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentConfigBuilder {
    pipeline: Option<PipelineNode>,
    roles: Option<Arc<ColumnRoleSet>>,
    label_column: Option<String>,
    metric: BinaryClassificationMetric,
    time_budget_secs: i64,
    tuner: TunerStrategy,
    train_set: Option<Arc<DataFrame>>,
    validation_set: Option<Arc<DataFrame>>,
    monitor: Option<Arc<TrialMonitor>>,
    checkpoint_dir: Option<PathBuf>,
    max_concurrent_trials: usize,
    max_trials: Option<usize>,
    seed: Option<u64>,
}

impl Default for ExperimentConfigBuilder {
    fn default() -> Self {
        Self {
            pipeline: None,
            roles: None,
            label_column: None,
            metric: BinaryClassificationMetric::default(),
            time_budget_secs: 60,
            tuner: TunerStrategy::default(),
            train_set: None,
            validation_set: None,
            monitor: None,
            checkpoint_dir: None,
            max_concurrent_trials: 1,
            max_trials: None,
            seed: None,
        }
    }
}

impl ExperimentConfigBuilder {
    pub fn pipeline(mut self, pipeline: PipelineNode) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn roles(mut self, roles: Arc<ColumnRoleSet>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Defaults to the role set's label column
    pub fn label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = Some(name.into());
        self
    }

    pub fn metric(mut self, metric: BinaryClassificationMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn time_budget_secs(mut self, secs: i64) -> Self {
        self.time_budget_secs = secs;
        self
    }

    pub fn tuner(mut self, tuner: TunerStrategy) -> Self {
        self.tuner = tuner;
        self
    }

    pub fn datasets(mut self, data: &TrainTestData) -> Self {
        self.train_set = Some(data.train_set.clone());
        self.validation_set = Some(data.test_set.clone());
        self
    }

    pub fn train_set(mut self, df: Arc<DataFrame>) -> Self {
        self.train_set = Some(df);
        self
    }

    pub fn validation_set(mut self, df: Arc<DataFrame>) -> Self {
        self.validation_set = Some(df);
        self
    }

    pub fn monitor(mut self, monitor: Arc<TrialMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    pub fn max_concurrent_trials(mut self, n: usize) -> Self {
        self.max_concurrent_trials = n;
        self
    }

    pub fn max_trials(mut self, n: usize) -> Self {
        self.max_trials = Some(n);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<ExperimentConfig> {
        if self.time_budget_secs <= 0 {
            return Err(AutoMlError::ConfigurationError(format!(
                "time budget must be positive, got {}s",
                self.time_budget_secs
            )));
        }
        let roles = self
            .roles
            .ok_or_else(|| AutoMlError::ConfigurationError("column roles not set".to_string()))?;
        let label_column = match self.label_column {
            Some(name) => name,
            None => roles
                .label_column()
                .map(str::to_string)
                .ok_or_else(|| AutoMlError::ConfigurationError("no label column in column roles".to_string()))?,
        };
        match roles.role_of(&label_column) {
            Some(ColumnRole::Label) => {}
            Some(role) => {
                return Err(AutoMlError::ConfigurationError(format!(
                    "label column '{}' has role {}, not label",
                    label_column, role
                )))
            }
            None => {
                return Err(AutoMlError::ConfigurationError(format!(
                    "label column '{}' not in the column roles",
                    label_column
                )))
            }
        }
        let pipeline = self
            .pipeline
            .ok_or_else(|| AutoMlError::ConfigurationError("pipeline not set".to_string()))?;
        pipeline.validate()?;
        let train_set = self
            .train_set
            .ok_or_else(|| AutoMlError::ConfigurationError("training set not set".to_string()))?;
        let validation_set = self
            .validation_set
            .ok_or_else(|| AutoMlError::ConfigurationError("validation set not set".to_string()))?;
        if self.max_concurrent_trials == 0 {
            return Err(AutoMlError::ConfigurationError(
                "max concurrent trials must be at least 1".to_string(),
            ));
        }

        Ok(ExperimentConfig {
            pipeline: Arc::new(pipeline),
            roles,
            label_column,
            metric: self.metric,
            time_budget: Duration::from_secs(self.time_budget_secs as u64),
            tuner: self.tuner,
            train_set,
            validation_set,
            monitor: self.monitor,
            checkpoint_dir: self.checkpoint_dir,
            max_concurrent_trials: self.max_concurrent_trials,
            max_trials: self.max_trials,
            seed: self.seed,
        })
    }
}
