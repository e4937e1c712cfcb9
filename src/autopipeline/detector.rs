//! Automatic column role inference

use crate::data::{ColumnRole, ColumnRoleSet, DataLoader, LoaderOptions};
use crate::error::{AutoMlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Detected column information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Inferred role
    pub role: ColumnRole,
    /// Number of unique non-null values
    pub n_unique: usize,
    /// Number of missing values
    pub n_missing: usize,
    /// Fraction missing
    pub pct_missing: f64,
    /// Single distinct value (or none at all)
    pub is_constant: bool,
    /// Average whitespace-separated tokens per value (string columns)
    pub avg_tokens: Option<f64>,
}

/// Inferred roles plus the options used to read the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInferenceResults {
    pub column_roles: ColumnRoleSet,
    pub columns: Vec<ColumnInfo>,
    pub loader_options: LoaderOptions,
    pub n_rows: usize,
}

impl ColumnInferenceResults {
    pub fn label_column(&self) -> Option<&str> {
        self.column_roles.label_column()
    }
}

/// Infers numeric / categorical / text / ignored roles for every column
#[derive(Debug, Clone)]
pub struct ColumnInferencer {
    /// Unique-ratio threshold below which a string column is categorical
    categorical_threshold: f64,
    /// Maximum unique values for a string column to stay categorical
    max_categorical_unique: usize,
    /// Average token count above which a string column is free text
    text_token_threshold: f64,
    loader_options: LoaderOptions,
}

impl ColumnInferencer {
    /// Create new inferencer with defaults
    pub fn new() -> Self {
        Self {
            categorical_threshold: 0.05,
            max_categorical_unique: 50,
            text_token_threshold: 1.5,
            loader_options: LoaderOptions::default(),
        }
    }

    /// String columns with more distinct values than this become text
    pub fn with_max_categorical_unique(mut self, max: usize) -> Self {
        self.max_categorical_unique = max;
        self
    }

    /// Read the file and infer roles, designating `label_column` as the label
    pub fn infer_columns(&self, path: &Path, label_column: &str) -> Result<ColumnInferenceResults> {
        let df = DataLoader::new(self.loader_options.clone()).read_raw(path)?;
        self.infer_from_frame(&df, label_column)
    }

    /// Infer roles from an in-memory frame
    pub fn infer_from_frame(&self, df: &DataFrame, label_column: &str) -> Result<ColumnInferenceResults> {
        if df.column(label_column).is_err() {
            return Err(AutoMlError::DataLoadError(format!(
                "label column '{}' not found in dataset",
                label_column
            )));
        }

        let n_rows = df.height();
        let mut roles = ColumnRoleSet::new();
        let mut columns = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();
            let info = self.inspect(&name, series, n_rows, name == label_column)?;
            debug!(column = %info.name, role = %info.role, n_unique = info.n_unique, "Column inferred");
            roles.insert(name, info.role);
            columns.push(info);
        }

        info!(
            numeric = roles.columns_with(ColumnRole::Numeric).len(),
            categorical = roles.columns_with(ColumnRole::Categorical).len(),
            text = roles.columns_with(ColumnRole::Text).len(),
            ignored = roles.columns_with(ColumnRole::Ignored).len(),
            "Column inference complete"
        );

        Ok(ColumnInferenceResults {
            column_roles: roles,
            columns,
            loader_options: self.loader_options.clone(),
            n_rows,
        })
    }

    fn inspect(&self, name: &str, series: &Series, n_rows: usize, is_label: bool) -> Result<ColumnInfo> {
        let n_missing = series.null_count();
        let pct_missing = n_missing as f64 / n_rows.max(1) as f64;
        let non_null = series.drop_nulls();
        let n_unique = non_null.n_unique()?;
        let is_constant = n_unique <= 1;

        let avg_tokens = if is_string(series.dtype()) {
            let values = non_null.str()?;
            let (tokens, count) = values
                .into_iter()
                .flatten()
                .fold((0usize, 0usize), |(t, c), v| (t + v.split_whitespace().count(), c + 1));
            Some(if count == 0 { 0.0 } else { tokens as f64 / count as f64 })
        } else {
            None
        };

        let role = if is_label {
            ColumnRole::Label
        } else if is_constant {
            ColumnRole::Ignored
        } else if is_numeric(series.dtype()) || is_boolean(series.dtype()) {
            ColumnRole::Numeric
        } else if is_string(series.dtype()) {
            let unique_ratio = n_unique as f64 / (n_rows - n_missing).max(1) as f64;
            let tokens = avg_tokens.unwrap_or(0.0);
            if tokens > self.text_token_threshold {
                ColumnRole::Text
            } else if n_unique <= self.max_categorical_unique || unique_ratio < self.categorical_threshold {
                ColumnRole::Categorical
            } else {
                ColumnRole::Text
            }
        } else {
            ColumnRole::Ignored
        };

        Ok(ColumnInfo {
            name: name.to_string(),
            role,
            n_unique,
            n_missing,
            pct_missing,
            is_constant,
            avg_tokens,
        })
    }
}

impl Default for ColumnInferencer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_boolean(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Boolean)
}

fn is_string(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String)
}
