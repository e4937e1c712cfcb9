//! Data preprocessing module
//!
//! Turns a role-conformed frame into the dense matrix the trainers consume:
//! - Missing value imputation (mean, median) and standardization
//! - One-hot encoding of categorical columns
//! - Hashed bag-of-words for text columns

mod encoder;
mod featurizer;
mod scaler;

pub use encoder::{OneHotEncoding, TextHashing};
pub use featurizer::{FeaturizerOptions, FittedFeaturizer};
pub use scaler::{ImputeStrategy, NumericTransform};
