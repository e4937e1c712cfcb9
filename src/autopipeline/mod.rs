//! Automated pipeline construction
//!
//! - Column role inference from the raw dataset
//! - Sweepable pipeline tree and its flattened search space
//! - Resolution of a sampled configuration into a fitted pipeline

mod detector;
mod fitted;
mod pipeline;

pub use detector::{ColumnInferenceResults, ColumnInferencer, ColumnInfo};
pub use fitted::{label_values, FittedPipeline, DEFAULT_THRESHOLD};
pub use pipeline::{EstimatorKind, EstimatorSpec, PipelineNode, PipelinePlan, ResolvedStep};
