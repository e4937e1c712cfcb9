//! Depth-wise gradient boosted trees for binary classification

use super::tree::{build_depthwise_tree, sigmoid, GradientView, TreeNode, TreeParams};
use crate::error::{AutoMlError, Result};
use crate::optimizer::{Parameter, ParameterValue, SearchSpace, TrialParams};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastTreeConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub max_leaves: usize,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    /// Row fraction per tree
    pub subsample: f64,
}

impl Default for FastTreeConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.2,
            max_depth: 6,
            max_leaves: 20,
            min_child_samples: 10,
            reg_lambda: 1.0,
            subsample: 1.0,
        }
    }
}

impl FastTreeConfig {
    pub fn search_space() -> SearchSpace {
        SearchSpace::new()
            .add(Parameter::log_int("n_estimators", 4, 512).with_default(ParameterValue::Int(4)))
            .add(Parameter::int("max_depth", 2, 10).with_default(ParameterValue::Int(3)))
            .add(Parameter::log_int("max_leaves", 4, 128).with_default(ParameterValue::Int(4)))
            .add(Parameter::log_int("min_child_samples", 2, 64).with_default(ParameterValue::Int(10)))
            .add(Parameter::log_float("learning_rate", 0.01, 1.0).with_default(ParameterValue::Float(0.2)))
            .add(Parameter::float("subsample", 0.5, 1.0).with_default(ParameterValue::Float(1.0)))
    }

    pub fn from_params(params: &TrialParams) -> Self {
        let base = Self::default();
        let int = |k: &str, d: usize| params.get(k).and_then(|v| v.as_int()).map_or(d, |v| v.max(1) as usize);
        let float = |k: &str, d: f64| params.get(k).and_then(|v| v.as_float()).unwrap_or(d);
        Self {
            n_estimators: int("n_estimators", base.n_estimators),
            learning_rate: float("learning_rate", base.learning_rate),
            max_depth: int("max_depth", base.max_depth),
            max_leaves: int("max_leaves", base.max_leaves).max(2),
            min_child_samples: int("min_child_samples", base.min_child_samples),
            reg_lambda: float("reg_lambda", base.reg_lambda),
            subsample: float("subsample", base.subsample).clamp(0.05, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastTreeClassifier {
    pub config: FastTreeConfig,
    trees: Vec<TreeNode>,
    base_prediction: f64,
}

impl FastTreeClassifier {
    pub fn new(config: FastTreeConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(AutoMlError::TrainingError("Empty dataset".into()));
        }
        if y.len() != n {
            return Err(AutoMlError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.learning_rate <= 0.0 {
            return Err(AutoMlError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.config.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let pos = y.iter().filter(|&&v| v > 0.5).count() as f64;
        self.base_prediction = ((pos + 0.5) / (n as f64 - pos + 0.5)).ln();
        self.trees.clear();

        let tree_params = TreeParams {
            max_leaves: self.config.max_leaves,
            max_depth: self.config.max_depth,
            min_child_samples: self.config.min_child_samples.max(1),
            reg_lambda: self.config.reg_lambda,
            reg_alpha: 0.0,
        };
        let features: Vec<usize> = (0..x.ncols()).collect();
        let n_rows = ((n as f64 * self.config.subsample).ceil() as usize).clamp(1, n);
        let mut raw = Array1::from_elem(n, self.base_prediction);

        for _ in 0..self.config.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let gradients: Vec<f64> = probs.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let hessians: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let mut indices: Vec<usize> = (0..n).collect();
            if n_rows < n {
                indices.shuffle(&mut rng);
                indices.truncate(n_rows);
            }

            let view = GradientView {
                x,
                gradients: &gradients,
                hessians: &hessians,
            };
            let tree = build_depthwise_tree(&view, &indices, &features, &tree_params);
            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn decision_function(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self.config.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
            })
            .collect()
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        self.decision_function(x).mapv(sigmoid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_tree_learns_two_feature_boundary() {
        let x = Array2::from_shape_fn((200, 2), |(i, j)| if j == 0 { (i % 20) as f64 } else { (i / 20) as f64 });
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] >= 10.0 && r[1] >= 5.0 { 1.0 } else { 0.0 })
            .collect();

        let config = FastTreeConfig { n_estimators: 30, max_depth: 3, min_child_samples: 2, ..Default::default() };
        let mut model = FastTreeClassifier::new(config);
        model.fit(&x, &y, 7).unwrap();

        let proba = model.predict_proba(&x);
        let correct = proba.iter().zip(y.iter()).filter(|(p, t)| (**p >= 0.5) == (**t > 0.5)).count();
        assert!(correct >= 190, "correct {}", correct);
    }

    #[test]
    fn test_shape_mismatch() {
        let x = Array2::<f64>::zeros((4, 1));
        let y = Array1::<f64>::zeros(3);
        let err = FastTreeClassifier::new(FastTreeConfig::default()).fit(&x, &y, 1).unwrap_err();
        assert!(matches!(err, AutoMlError::ShapeError { .. }));
    }

    #[test]
    fn test_defaults_are_cheap() {
        let config = FastTreeConfig::from_params(&FastTreeConfig::search_space().defaults());
        assert_eq!(config.n_estimators, 4);
        assert_eq!(config.max_depth, 3);
    }
}
