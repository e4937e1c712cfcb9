//! Error types for the AutoML experiment

use thiserror::Error;

/// Result type alias for experiment operations
pub type Result<T> = std::result::Result<T, AutoMlError>;

/// Main error type for the experiment
#[derive(Error, Debug)]
pub enum AutoMlError {
    /// Invalid experiment setup (time budget, label column, missing parts)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Dataset file missing or malformed
    #[error("Data load error: {0}")]
    DataLoadError(String),

    /// A single record could not be scored
    #[error("Prediction error for record {record_id}: {reason}")]
    PredictionError { record_id: i64, reason: String },

    /// Failure inside trial bookkeeping
    #[error("Monitor error: {0}")]
    MonitorError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl From<polars::error::PolarsError> for AutoMlError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoMlError::DataLoadError(err.to_string())
    }
}

impl From<serde_json::Error> for AutoMlError {
    fn from(err: serde_json::Error) -> Self {
        AutoMlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutoMlError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutoMlError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
