//! Titanic AutoML - time-boxed model search for passenger survival
//!
//! Loads the passenger dataset, infers column roles, applies manual overrides,
//! searches a featurizer + classifier pipeline space within a wall-clock
//! budget, evaluates and saves the best model, and scores sample passengers.
//!
//! # Modules
//!
//! - [`data`] - Column roles, CSV loading, train/validation split, passenger records
//! - [`autopipeline`] - Column inference and the sweepable pipeline tree
//! - [`preprocessing`] - Imputation, scaling, one-hot and hashed-text featurization
//! - [`training`] - LightGBM-style, FastTree and logistic regression trainers, metrics
//! - [`optimizer`] - Search spaces and tuners (random, TPE, ECI cost-frugal)
//! - [`experiment`] - Configuration, async runner, trial monitor, checkpoints
//! - [`export`] - JSON model persistence
//! - [`inference`] - Per-record batch prediction
//! - [`context`] - Explicit ML session (seed, thread pool, run id)
//! - [`cli`] - Command-line interface

pub mod error;

pub mod context;
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod autopipeline;
pub mod experiment;
pub mod export;
pub mod inference;

pub mod cli;

pub use error::{AutoMlError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::autopipeline::{ColumnInferencer, FittedPipeline, PipelineNode};
    pub use crate::context::{ContextConfig, MlContext};
    pub use crate::data::{
        sample_passengers, train_test_split, ColumnRole, ColumnRoleSet, DataLoader, Passenger,
        ReclassificationRule,
    };
    pub use crate::error::{AutoMlError, Result};
    pub use crate::experiment::{ExperimentConfig, ExperimentResult, ExperimentRunner, TrialMonitor};
    pub use crate::export::ModelSerializer;
    pub use crate::inference::{BatchPredictor, PredictionOutcome, PredictionResult};
    pub use crate::optimizer::{SearchSpace, TunerStrategy};
    pub use crate::training::{BinaryClassificationMetric, BinaryClassificationMetrics, TrainerKind};
}
