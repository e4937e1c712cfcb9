//! L2-regularized logistic regression

use super::tree::sigmoid;
use crate::error::{AutoMlError, Result};
use crate::optimizer::{Parameter, ParameterValue, SearchSpace, TrialParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    pub learning_rate: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }
}

impl LogisticRegressionConfig {
    pub fn search_space() -> SearchSpace {
        SearchSpace::new()
            .add(Parameter::log_float("alpha", 1e-4, 1.0).with_default(ParameterValue::Float(0.01)))
            .add(Parameter::log_int("max_iter", 50, 2000).with_default(ParameterValue::Int(100)))
            .add(Parameter::log_float("learning_rate", 0.01, 1.0).with_default(ParameterValue::Float(0.1)))
    }

    pub fn from_params(params: &TrialParams) -> Self {
        let base = Self::default();
        Self {
            alpha: params.get("alpha").and_then(|v| v.as_float()).unwrap_or(base.alpha),
            max_iter: params
                .get("max_iter")
                .and_then(|v| v.as_int())
                .map_or(base.max_iter, |v| v.max(1) as usize),
            tol: base.tol,
            learning_rate: params
                .get("learning_rate")
                .and_then(|v| v.as_float())
                .unwrap_or(base.learning_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub config: LogisticRegressionConfig,
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: 0.0,
        }
    }

    /// Fit the model using full-batch gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 {
            return Err(AutoMlError::TrainingError("Empty dataset".into()));
        }
        if n_samples != y.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;
        let lr = self.config.learning_rate;
        let alpha = self.config.alpha;

        for _ in 0..self.config.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = linear.mapv(sigmoid);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.config.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(AutoMlError::TrainingError("logistic regression diverged".into()));
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        Ok(())
    }

    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}
