//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Key differences from the depth-wise boosted trees in `fast_tree`:
//! - Leaf-wise (best-first) tree growth instead of level-wise
//! - Gradient-based One-Side Sampling (GOSS): keeps top gradients, samples low
//!   gradients and re-weights them by `(1 - top_rate) / other_rate`

use super::tree::{build_leafwise_tree, sigmoid, GradientView, TreeNode, TreeParams};
use crate::error::{AutoMlError, Result};
use crate::optimizer::{Parameter, ParameterValue, SearchSpace, TrialParams};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGbmConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub colsample_bytree: f64,
    pub top_rate: f64,
    pub other_rate: f64,
}

impl Default for LightGbmConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            colsample_bytree: 1.0,
            top_rate: 0.2,
            other_rate: 0.1,
        }
    }
}

impl LightGbmConfig {
    /// Searchable parameters; defaults are the cheapest configuration
    pub fn search_space() -> SearchSpace {
        SearchSpace::new()
            .add(Parameter::log_int("n_estimators", 4, 512).with_default(ParameterValue::Int(4)))
            .add(Parameter::log_int("max_leaves", 4, 128).with_default(ParameterValue::Int(4)))
            .add(Parameter::log_int("min_child_samples", 2, 64).with_default(ParameterValue::Int(20)))
            .add(Parameter::log_float("learning_rate", 0.01, 1.0).with_default(ParameterValue::Float(0.1)))
            .add(Parameter::log_float("reg_lambda", 1e-3, 10.0).with_default(ParameterValue::Float(1.0)))
            .add(Parameter::float("colsample_bytree", 0.5, 1.0).with_default(ParameterValue::Float(1.0)))
            .add(Parameter::float("top_rate", 0.1, 0.5).with_default(ParameterValue::Float(0.2)))
            .add(Parameter::float("other_rate", 0.05, 0.5).with_default(ParameterValue::Float(0.1)))
    }

    /// Overlay sampled values on the defaults
    pub fn from_params(params: &TrialParams) -> Self {
        let base = Self::default();
        let int = |k: &str, d: usize| params.get(k).and_then(|v| v.as_int()).map_or(d, |v| v.max(1) as usize);
        let float = |k: &str, d: f64| params.get(k).and_then(|v| v.as_float()).unwrap_or(d);
        Self {
            n_estimators: int("n_estimators", base.n_estimators),
            learning_rate: float("learning_rate", base.learning_rate),
            max_leaves: int("max_leaves", base.max_leaves).max(2),
            max_depth: params.get("max_depth").and_then(|v| v.as_int()).map(|d| d.max(1) as usize),
            min_child_samples: int("min_child_samples", base.min_child_samples),
            reg_lambda: float("reg_lambda", base.reg_lambda),
            reg_alpha: float("reg_alpha", base.reg_alpha),
            colsample_bytree: float("colsample_bytree", base.colsample_bytree).clamp(0.05, 1.0),
            top_rate: float("top_rate", base.top_rate),
            other_rate: float("other_rate", base.other_rate),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(AutoMlError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.top_rate < 0.0 || self.other_rate < 0.0 {
            return Err(AutoMlError::InvalidParameter {
                name: "top_rate/other_rate".to_string(),
                value: format!("{}/{}", self.top_rate, self.other_rate),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_leaves: self.max_leaves,
            max_depth: self.max_depth.unwrap_or(usize::MAX),
            min_child_samples: self.min_child_samples.max(1),
            reg_lambda: self.reg_lambda,
            reg_alpha: self.reg_alpha,
        }
    }
}

/// GOSS row selection; returns the rows and each row's gradient weight
fn goss_sample(
    gradients: &[f64],
    top_rate: f64,
    other_rate: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> (Vec<usize>, Vec<f64>) {
    let n = gradients.len();
    let n_top = ((n as f64 * top_rate).ceil() as usize).min(n);
    let n_other = ((n as f64 * other_rate).ceil() as usize).min(n - n_top);

    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| gradients[b].abs().total_cmp(&gradients[a].abs()));

    let mut weights = vec![1.0; n];
    let mut selected: Vec<usize> = sorted[..n_top].to_vec();
    let mut remaining: Vec<usize> = sorted[n_top..].to_vec();
    remaining.shuffle(rng);

    let amplify = if n_other > 0 { (1.0 - top_rate) / other_rate.max(1e-12) } else { 1.0 };
    for &i in remaining.iter().take(n_other) {
        weights[i] = amplify;
        selected.push(i);
    }
    (selected, weights)
}

/// Binary classifier on the log-odds scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGbmClassifier {
    pub config: LightGbmConfig,
    trees: Vec<TreeNode>,
    base_prediction: f64,
}

impl LightGbmClassifier {
    pub fn new(config: LightGbmConfig) -> Self {
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
        self.config.validate()?;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let pos = y.iter().filter(|&&v| v > 0.5).count() as f64;
        let neg = n as f64 - pos;
        self.base_prediction = ((pos + 0.5) / (neg + 0.5)).ln();
        self.trees.clear();

        let use_goss = self.config.top_rate + self.config.other_rate < 1.0;
        let tree_params = self.config.tree_params();
        let n_features = x.ncols();
        let n_selected = ((n_features as f64 * self.config.colsample_bytree).ceil() as usize).clamp(1, n_features.max(1));
        let mut raw = Array1::from_elem(n, self.base_prediction);

        for _ in 0..self.config.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let mut gradients: Vec<f64> = probs.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let mut hessians: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let indices = if use_goss {
                let (indices, weights) =
                    goss_sample(&gradients, self.config.top_rate, self.config.other_rate, &mut rng);
                for (i, w) in weights.iter().enumerate() {
                    gradients[i] *= w;
                    hessians[i] *= w;
                }
                indices
            } else {
                (0..n).collect()
            };

            let mut features: Vec<usize> = (0..n_features).collect();
            features.shuffle(&mut rng);
            features.truncate(n_selected);
            features.sort_unstable();

            let view = GradientView {
                x,
                gradients: &gradients,
                hessians: &hessians,
            };
            let tree = build_leafwise_tree(&view, &indices, &features, &tree_params);
            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    /// Raw log-odds per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self
                        .trees
                        .iter()
                        .map(|t| self.config.learning_rate * t.predict(row))
                        .sum::<f64>()
            })
            .collect()
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        self.decision_function(x).mapv(sigmoid)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
