//! Model training module
//!
//! Binary classification trainers searched by the experiment:
//! - LightGBM-style boosting (leaf-wise growth, GOSS)
//! - FastTree boosting (depth-wise growth)
//! - L2-regularized logistic regression
//!
//! plus the metrics used to score them.

mod classifier;
pub mod fast_tree;
pub mod lightgbm;
pub mod linear_models;
mod metrics;
mod tree;

pub use classifier::{TrainedClassifier, TrainerConfig, TrainerKind};
pub use fast_tree::{FastTreeClassifier, FastTreeConfig};
pub use lightgbm::{LightGbmClassifier, LightGbmConfig};
pub use linear_models::{LogisticRegression, LogisticRegressionConfig};
pub use metrics::{BinaryClassificationMetric, BinaryClassificationMetrics, ConfusionMatrix};
pub use tree::TreeNode;
