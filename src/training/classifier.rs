//! Trainer catalog for binary classification

use super::fast_tree::{FastTreeClassifier, FastTreeConfig};
use super::lightgbm::{LightGbmClassifier, LightGbmConfig};
use super::linear_models::{LogisticRegression, LogisticRegressionConfig};
use crate::error::{AutoMlError, Result};
use crate::optimizer::{SearchSpace, TrialParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trainers available to the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerKind {
    #[serde(rename = "lightgbm")]
    LightGbm,
    FastTree,
    LogisticRegression,
}

impl TrainerKind {
    pub const ALL: [TrainerKind; 3] = [TrainerKind::LightGbm, TrainerKind::FastTree, TrainerKind::LogisticRegression];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainerKind::LightGbm => "lightgbm",
            TrainerKind::FastTree => "fast_tree",
            TrainerKind::LogisticRegression => "logistic_regression",
        }
    }

    pub fn search_space(&self) -> SearchSpace {
        match self {
            TrainerKind::LightGbm => LightGbmConfig::search_space(),
            TrainerKind::FastTree => FastTreeConfig::search_space(),
            TrainerKind::LogisticRegression => LogisticRegressionConfig::search_space(),
        }
    }

    /// Resolve sampled (unprefixed) parameters into a concrete trainer config
    pub fn configure(&self, params: &TrialParams) -> TrainerConfig {
        match self {
            TrainerKind::LightGbm => TrainerConfig::LightGbm(LightGbmConfig::from_params(params)),
            TrainerKind::FastTree => TrainerConfig::FastTree(FastTreeConfig::from_params(params)),
            TrainerKind::LogisticRegression => {
                TrainerConfig::LogisticRegression(LogisticRegressionConfig::from_params(params))
            }
        }
    }
}

impl fmt::Display for TrainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainerKind {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "lightgbm" | "light_gbm" => Ok(TrainerKind::LightGbm),
            "fast_tree" | "fasttree" => Ok(TrainerKind::FastTree),
            "logistic_regression" | "logistic" => Ok(TrainerKind::LogisticRegression),
            other => Err(AutoMlError::InvalidParameter {
                name: "trainer".to_string(),
                value: other.to_string(),
                reason: "expected lightgbm, fast_tree or logistic_regression".to_string(),
            }),
        }
    }
}

/// Concrete trainer hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trainer", rename_all = "snake_case")]
pub enum TrainerConfig {
    #[serde(rename = "lightgbm")]
    LightGbm(LightGbmConfig),
    FastTree(FastTreeConfig),
    LogisticRegression(LogisticRegressionConfig),
}

impl TrainerConfig {
    pub fn kind(&self) -> TrainerKind {
        match self {
            TrainerConfig::LightGbm(_) => TrainerKind::LightGbm,
            TrainerConfig::FastTree(_) => TrainerKind::FastTree,
            TrainerConfig::LogisticRegression(_) => TrainerKind::LogisticRegression,
        }
    }

    /// Fit on 0/1 labels
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<TrainedClassifier> {
        match self {
            TrainerConfig::LightGbm(config) => {
                let mut model = LightGbmClassifier::new(config.clone());
                model.fit(x, y, seed)?;
                Ok(TrainedClassifier::LightGbm(model))
            }
            TrainerConfig::FastTree(config) => {
                let mut model = FastTreeClassifier::new(config.clone());
                model.fit(x, y, seed)?;
                Ok(TrainedClassifier::FastTree(model))
            }
            TrainerConfig::LogisticRegression(config) => {
                let mut model = LogisticRegression::new(config.clone());
                model.fit(x, y)?;
                Ok(TrainedClassifier::LogisticRegression(model))
            }
        }
    }
}

/// A fitted classifier of any supported kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trainer", rename_all = "snake_case")]
pub enum TrainedClassifier {
    #[serde(rename = "lightgbm")]
    LightGbm(LightGbmClassifier),
    FastTree(FastTreeClassifier),
    LogisticRegression(LogisticRegression),
}

impl TrainedClassifier {
    pub fn kind(&self) -> TrainerKind {
        match self {
            TrainedClassifier::LightGbm(_) => TrainerKind::LightGbm,
            TrainedClassifier::FastTree(_) => TrainerKind::FastTree,
            TrainedClassifier::LogisticRegression(_) => TrainerKind::LogisticRegression,
        }
    }

    /// Raw margin (log-odds) per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedClassifier::LightGbm(m) => Ok(m.decision_function(x)),
            TrainedClassifier::FastTree(m) => Ok(m.decision_function(x)),
            TrainedClassifier::LogisticRegression(m) => m.decision_function(x),
        }
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedClassifier::LightGbm(m) => Ok(m.predict_proba(x)),
            TrainedClassifier::FastTree(m) => Ok(m.predict_proba(x)),
            TrainedClassifier::LogisticRegression(m) => m.predict_proba(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| if j == 0 { i as f64 / 80.0 } else { (i % 7) as f64 });
        let y = (0..80).map(|i| if i >= 40 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_every_trainer_fits_at_defaults() {
        let (x, y) = data();
        for kind in TrainerKind::ALL {
            let config = kind.configure(&kind.search_space().defaults());
            assert_eq!(config.kind(), kind);
            let model = config.fit(&x, &y, 1).unwrap();
            assert_eq!(model.kind(), kind);
            let proba = model.predict_proba(&x).unwrap();
            assert_eq!(proba.len(), 80);
            assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_trained_classifier_serde() {
        let (x, y) = data();
        let model = TrainerKind::FastTree
            .configure(&TrialParams::new())
            .fit(&x, &y, 3)
            .unwrap();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"trainer\":\"fast_tree\""));
        let back: TrainedClassifier = serde_json::from_str(&json).unwrap();
        let a = model.predict_proba(&x).unwrap();
        let b = back.predict_proba(&x).unwrap();
        assert!(a.iter().zip(b.iter()).all(|(p, q)| (p - q).abs() < 1e-9));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("LightGbm".parse::<TrainerKind>().unwrap(), TrainerKind::LightGbm);
        assert_eq!("fast-tree".parse::<TrainerKind>().unwrap(), TrainerKind::FastTree);
        assert!("fast_forest".parse::<TrainerKind>().is_err());
    }
}
