//! Role-driven featurization of a conformed frame into a dense matrix

use super::encoder::{OneHotEncoding, TextHashing};
use super::scaler::{ImputeStrategy, NumericTransform};
use crate::data::{ColumnRole, ColumnRoleSet};
use crate::error::{AutoMlError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Featurizer settings; part of the pipeline search space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturizerOptions {
    pub impute: ImputeStrategy,
    pub standardize: bool,
    /// Hash buckets per text column
    pub text_buckets: usize,
}

impl Default for FeaturizerOptions {
    fn default() -> Self {
        Self {
            impute: ImputeStrategy::Mean,
            standardize: true,
            text_buckets: 32,
        }
    }
}

impl FeaturizerOptions {
    pub fn with_impute(mut self, impute: ImputeStrategy) -> Self {
        self.impute = impute;
        self
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn with_text_buckets(mut self, n: usize) -> Self {
        self.text_buckets = n;
        self
    }
}

/// Fitted featurizer: numeric, then categorical, then text blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedFeaturizer {
    pub options: FeaturizerOptions,
    numeric: Vec<NumericTransform>,
    categorical: Vec<OneHotEncoding>,
    text: Vec<TextHashing>,
}

impl FittedFeaturizer {
    /// Fit on a frame already conformed to `roles`
    pub fn fit(df: &DataFrame, roles: &ColumnRoleSet, options: FeaturizerOptions) -> Result<Self> {
        let numeric = roles
            .columns_with(ColumnRole::Numeric)
            .into_iter()
            .map(|name| {
                let series = float_series(df, name)?;
                NumericTransform::fit(name, &series, options.impute, options.standardize)
            })
            .collect::<Result<Vec<_>>>()?;

        let categorical = roles
            .columns_with(ColumnRole::Categorical)
            .into_iter()
            .map(|name| {
                let series = string_series(df, name)?;
                let ca = series.str()?;
                Ok(OneHotEncoding::fit(name, ca.into_iter()))
            })
            .collect::<Result<Vec<_>>>()?;

        let text = roles
            .columns_with(ColumnRole::Text)
            .into_iter()
            .map(|name| TextHashing::new(name, options.text_buckets))
            .collect::<Vec<_>>();

        let fitted = Self {
            options,
            numeric,
            categorical,
            text,
        };
        debug!(
            n_features = fitted.n_features(),
            numeric = fitted.numeric.len(),
            categorical = fitted.categorical.len(),
            text = fitted.text.len(),
            "Featurizer fitted"
        );
        Ok(fitted)
    }

    pub fn n_features(&self) -> usize {
        self.numeric.len()
            + self.categorical.iter().map(|c| c.width()).sum::<usize>()
            + self.text.iter().map(|t| t.width()).sum::<usize>()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|n| n.column.clone()).collect();
        for c in &self.categorical {
            names.extend(c.feature_names());
        }
        for t in &self.text {
            names.extend(t.feature_names());
        }
        names
    }

    /// Encode every row of `df` into an `(n_rows, n_features)` matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let n_rows = df.height();
        let mut x = Array2::<f64>::zeros((n_rows, self.n_features()));
        let mut offset = 0;

        for t in &self.numeric {
            let series = float_series(df, &t.column)?;
            let ca = series.f64()?;
            for (row, value) in ca.into_iter().enumerate() {
                x[[row, offset]] = t.apply(value);
            }
            offset += 1;
        }

        for enc in &self.categorical {
            let width = enc.width();
            let series = string_series(df, &enc.column)?;
            let ca = series.str()?;
            let mut buf = vec![0.0; width];
            for (row, value) in ca.into_iter().enumerate() {
                enc.encode_into(value, &mut buf);
                for (j, v) in buf.iter().enumerate() {
                    x[[row, offset + j]] = *v;
                }
            }
            offset += width;
        }

        for enc in &self.text {
            let width = enc.width();
            let series = string_series(df, &enc.column)?;
            let ca = series.str()?;
            let mut buf = vec![0.0; width];
            for (row, value) in ca.into_iter().enumerate() {
                enc.encode_into(value, &mut buf);
                for (j, v) in buf.iter().enumerate() {
                    x[[row, offset + j]] = *v;
                }
            }
            offset += width;
        }

        Ok(x)
    }
}

fn float_series(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| AutoMlError::FeatureNotFound(name.to_string()))?;
    Ok(column.as_materialized_series().cast(&DataType::Float64)?)
}

fn string_series(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| AutoMlError::FeatureNotFound(name.to_string()))?;
    Ok(column.as_materialized_series().cast(&DataType::String)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> ColumnRoleSet {
        ColumnRoleSet::new()
            .with("Survived", ColumnRole::Label)
            .with("Age", ColumnRole::Numeric)
            .with("Sex", ColumnRole::Categorical)
            .with("Name", ColumnRole::Text)
            .with("PassengerId", ColumnRole::Ignored)
    }

    fn frame() -> DataFrame {
        df!(
            "PassengerId" => &[1i64, 2, 3],
            "Survived" => &[0.0, 1.0, 1.0],
            "Age" => &[Some(22.0), None, Some(26.0)],
            "Sex" => &["male", "female", "female"],
            "Name" => &["Braund, Mr. Owen", "Cumings, Mrs. John", "Heikkinen, Miss. Laina"]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_transform_shape() {
        let opts = FeaturizerOptions::default().with_text_buckets(8);
        let f = FittedFeaturizer::fit(&frame(), &roles(), opts).unwrap();
        assert_eq!(f.n_features(), 1 + 2 + 8);
        assert_eq!(f.feature_names().len(), f.n_features());

        let x = f.transform(&frame()).unwrap();
        assert_eq!(x.dim(), (3, 11));
        assert!(x.iter().all(|v| v.is_finite()));
        // missing age imputed to the mean, which standardizes to 0
        assert!(x[[1, 0]].abs() < 1e-12);
    }

    #[test]
    fn test_unseen_category_is_zero() {
        let f = FittedFeaturizer::fit(&frame(), &roles(), FeaturizerOptions::default()).unwrap();
        let scoring = df!(
            "Age" => &[30.0],
            "Sex" => &["unknown"],
            "Name" => &["Nobody"]
        )
        .unwrap();
        let x = f.transform(&scoring).unwrap();
        assert_eq!(x[[0, 1]], 0.0);
        assert_eq!(x[[0, 2]], 0.0);
    }

    #[test]
    fn test_missing_feature_column() {
        let f = FittedFeaturizer::fit(&frame(), &roles(), FeaturizerOptions::default()).unwrap();
        let scoring = df!("Age" => &[30.0]).unwrap();
        let err = f.transform(&scoring).unwrap_err();
        assert!(matches!(err, AutoMlError::FeatureNotFound(_)));
    }

    #[test]
    fn test_serde_roundtrip_preserves_output() {
        let f = FittedFeaturizer::fit(&frame(), &roles(), FeaturizerOptions::default()).unwrap();
        let json = serde_json::to_string(&f).unwrap();
        let back: FittedFeaturizer = serde_json::from_str(&json).unwrap();
        let a = f.transform(&frame()).unwrap();
        let b = back.transform(&frame()).unwrap();
        assert!(a.iter().zip(b.iter()).all(|(p, q)| (p - q).abs() < 1e-9));
    }
}
