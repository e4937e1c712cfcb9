//! Optimization configuration

use crate::error::{AutoMlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Whether `a` is strictly better than `b`
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => a < b,
            OptimizeDirection::Maximize => a > b,
        }
    }

    /// Map a score onto a loss (lower is better)
    pub fn to_loss(&self, score: f64) -> f64 {
        match self {
            OptimizeDirection::Minimize => score,
            OptimizeDirection::Maximize => -score,
        }
    }

    /// Score recorded for a trial that failed
    pub fn worst(&self) -> f64 {
        match self {
            OptimizeDirection::Minimize => f64::INFINITY,
            OptimizeDirection::Maximize => f64::NEG_INFINITY,
        }
    }
}

/// Search strategy driving the experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunerStrategy {
    /// Uniform random sampling
    Random,
    /// Tree-structured Parzen Estimator
    Tpe,
    /// Estimated-cost-for-improvement trainer selection with cost-frugal local search
    EciCostFrugal,
}

impl Default for TunerStrategy {
    fn default() -> Self {
        TunerStrategy::EciCostFrugal
    }
}

impl fmt::Display for TunerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TunerStrategy::Random => "random",
            TunerStrategy::Tpe => "tpe",
            TunerStrategy::EciCostFrugal => "eci-cost-frugal",
        };
        f.write_str(s)
    }
}

impl FromStr for TunerStrategy {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "random" => Ok(TunerStrategy::Random),
            "tpe" => Ok(TunerStrategy::Tpe),
            "eci-cost-frugal" | "eci" | "cfo" => Ok(TunerStrategy::EciCostFrugal),
            other => Err(AutoMlError::InvalidParameter {
                name: "tuner".to_string(),
                value: other.to_string(),
                reason: "expected random, tpe or eci-cost-frugal".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        assert!(OptimizeDirection::Maximize.is_better(0.9, 0.8));
        assert!(OptimizeDirection::Minimize.is_better(0.1, 0.2));
        assert_eq!(OptimizeDirection::Maximize.to_loss(0.7), -0.7);
        assert!(!OptimizeDirection::Maximize.is_better(OptimizeDirection::Maximize.worst(), 0.0));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("tpe".parse::<TunerStrategy>().unwrap(), TunerStrategy::Tpe);
        assert_eq!("ECI_COST_FRUGAL".parse::<TunerStrategy>().unwrap(), TunerStrategy::EciCostFrugal);
        assert!("grid".parse::<TunerStrategy>().is_err());
        assert_eq!(TunerStrategy::default().to_string(), "eci-cost-frugal");
    }
}
