//! Inference
//!
//! Batch prediction over literal passenger records with per-record error
//! isolation, parallelized with rayon.

mod batch;

pub use batch::{BatchPredictor, PredictionOutcome, PredictionResult};
