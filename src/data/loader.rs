//! Dataset loading
//!
//! Reads the delimited passenger file with polars and conforms every column to
//! the role it was assigned: numeric columns become `Float64`, categorical and
//! text columns become strings, the label becomes a 0/1 `Float64` column.

use super::schema::{ColumnRole, ColumnRoleSet};
use crate::error::{AutoMlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Options for reading the delimited file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderOptions {
    pub separator: u8,
    pub has_header: bool,
    /// Rows used by polars to infer raw dtypes
    pub infer_schema_length: Option<usize>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            has_header: true,
            infer_schema_length: Some(1000),
        }
    }
}

/// Data loader for the experiment dataset
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    options: LoaderOptions,
}

impl DataLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Read the file with polars' own dtype inference
    pub fn read_raw(&self, path: &Path) -> Result<DataFrame> {
        if !path.is_file() {
            return Err(AutoMlError::DataLoadError(format!(
                "dataset not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();
        let parse_opts = CsvParseOptions::default().with_separator(self.options.separator);
        let df = CsvReadOptions::default()
            .with_has_header(self.options.has_header)
            .with_infer_schema_length(self.options.infer_schema_length)
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| AutoMlError::DataLoadError(format!("{}: {}", path.display(), e)))?
            .finish()
            .map_err(|e| AutoMlError::DataLoadError(format!("{}: {}", path.display(), e)))?;

        if df.height() == 0 {
            return Err(AutoMlError::DataLoadError(format!(
                "dataset is empty: {}",
                path.display()
            )));
        }

        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Raw dataset read"
        );
        Ok(df)
    }

    /// Read the file and conform it to the column roles
    pub fn load(&self, path: &Path, roles: &ColumnRoleSet) -> Result<DataFrame> {
        let raw = self.read_raw(path)?;
        let df = conform_training_frame(&raw, roles)?;
        info!(path = %path.display(), rows = df.height(), cols = df.width(), "Dataset loaded");
        Ok(df)
    }
}

/// Conform an already-read frame (training data: label required)
pub fn conform_training_frame(df: &DataFrame, roles: &ColumnRoleSet) -> Result<DataFrame> {
    conform(df, roles, true)
}

/// Conform a frame of records to score (label column optional)
pub fn conform_scoring_frame(df: &DataFrame, roles: &ColumnRoleSet) -> Result<DataFrame> {
    conform(df, roles, false)
}

fn conform(df: &DataFrame, roles: &ColumnRoleSet, require_label: bool) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(roles.len());

    for name in roles.column_names() {
        let role = roles
            .role_of(name)
            .ok_or_else(|| AutoMlError::FeatureNotFound(name.clone()))?;

        let column = match df.column(name) {
            Ok(c) => c,
            Err(_) if role == ColumnRole::Label && !require_label => continue,
            Err(_) if role == ColumnRole::Ignored => continue,
            Err(_) => {
                return Err(AutoMlError::DataLoadError(format!(
                    "column '{}' ({}) missing from dataset",
                    name, role
                )))
            }
        };

        let conformed = match role {
            ColumnRole::Numeric => column.cast(&DataType::Float64)?,
            ColumnRole::Categorical | ColumnRole::Text => column.cast(&DataType::String)?,
            ColumnRole::Label => label_column(name, column.as_materialized_series())?,
            ColumnRole::Ignored => column.clone(),
        };
        columns.push(conformed);
    }

    Ok(DataFrame::new(columns)?)
}

/// Parse a boolean label from 0/1, true/false or yes/no values
fn label_column(name: &str, series: &Series) -> Result<Column> {
    let as_text = series.cast(&DataType::String)?;
    let values = as_text.str()?;

    let parsed: Vec<f64> = values
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v.map(|s| s.trim().to_lowercase()) {
            Some(s) if s == "1" || s == "true" || s == "yes" || s == "1.0" => Ok(1.0),
            Some(s) if s == "0" || s == "false" || s == "no" || s == "0.0" => Ok(0.0),
            Some(s) => Err(AutoMlError::DataLoadError(format!(
                "label '{}' row {}: cannot parse '{}' as boolean",
                name, row, s
            ))),
            None => Err(AutoMlError::DataLoadError(format!(
                "label '{}' row {}: missing value",
                name, row
            ))),
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Series::new(name.into(), parsed).into_column())
}
