//! Numeric column imputation and scaling

use crate::error::{AutoMlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How missing numeric values are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Median,
}

impl std::str::FromStr for ImputeStrategy {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(ImputeStrategy::Mean),
            "median" => Ok(ImputeStrategy::Median),
            other => Err(AutoMlError::InvalidParameter {
                name: "impute".to_string(),
                value: other.to_string(),
                reason: "expected mean or median".to_string(),
            }),
        }
    }
}

/// Fitted fill value and standardization parameters for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericTransform {
    pub column: String,
    pub fill: f64,
    pub center: f64,
    pub scale: f64,
}

impl NumericTransform {
    /// Fit on a `Float64` series. An all-null column fills with 0.
    pub fn fit(column: &str, series: &Series, strategy: ImputeStrategy, standardize: bool) -> Result<Self> {
        let ca = series.f64()?;

        let fill = match strategy {
            ImputeStrategy::Mean => ca.mean(),
            ImputeStrategy::Median => ca.median(),
        }
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

        let (center, scale) = if standardize {
            let mean = ca.mean().filter(|v| v.is_finite()).unwrap_or(0.0);
            let std = ca.std(1).filter(|v| v.is_finite() && *v > 0.0).unwrap_or(1.0);
            (mean, std)
        } else {
            (0.0, 1.0)
        };

        Ok(Self {
            column: column.to_string(),
            fill,
            center,
            scale,
        })
    }

    #[inline]
    pub fn apply(&self, value: Option<f64>) -> f64 {
        let v = match value {
            Some(v) if v.is_finite() => v,
            _ => self.fill,
        };
        (v - self.center) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_imputation_and_scaling() {
        let s = Series::new("age".into(), &[Some(10.0), None, Some(30.0)]);
        let t = NumericTransform::fit("age", &s, ImputeStrategy::Mean, true).unwrap();
        assert!((t.fill - 20.0).abs() < 1e-12);
        assert!(t.apply(None).abs() < 1e-12);
        assert!(t.apply(Some(30.0)) > 0.0);
    }

    #[test]
    fn test_median_without_scaling() {
        let s = Series::new("fare".into(), &[Some(1.0), Some(2.0), Some(100.0), None]);
        let t = NumericTransform::fit("fare", &s, ImputeStrategy::Median, false).unwrap();
        assert_eq!(t.apply(None), 2.0);
        assert_eq!(t.apply(Some(f64::NAN)), 2.0);
        assert_eq!(t.apply(Some(5.0)), 5.0);
    }

    #[test]
    fn test_all_null_column() {
        let s = Series::new("x".into(), &[None::<f64>, None]);
        let t = NumericTransform::fit("x", &s, ImputeStrategy::Mean, true).unwrap();
        assert_eq!(t.apply(None), 0.0);
    }
}
