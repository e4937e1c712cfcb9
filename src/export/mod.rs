//! Model persistence
//!
//! Fitted pipelines are written once, after a successful run, as a versioned
//! JSON envelope and read back for prediction.

mod serializer;

pub use serializer::{ModelEnvelope, ModelMetadata, ModelSerializer, FORMAT_VERSION};
