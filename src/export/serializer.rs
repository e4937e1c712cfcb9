//! JSON model file
//!
//! The file is a single envelope holding the column roles the pipeline was
//! trained with and the fitted pipeline itself. Writes go to a sibling temp
//! file first and are renamed into place.

use crate::autopipeline::FittedPipeline;
use crate::data::ColumnRoleSet;
use crate::error::{AutoMlError, Result};
use crate::training::TrainerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Bumped whenever the envelope or pipeline layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

/// Summary stored next to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub pipeline: String,
    pub trainer: TrainerKind,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub crate_version: String,
}

impl ModelMetadata {
    pub fn from_pipeline(pipeline: &FittedPipeline) -> Self {
        Self {
            pipeline: pipeline.description.clone(),
            trainer: pipeline.classifier.kind(),
            n_features: pipeline.featurizer.n_features(),
            feature_names: pipeline.featurizer.feature_names(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEnvelope {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub metadata: ModelMetadata,
    pub schema: ColumnRoleSet,
    pub pipeline: FittedPipeline,
}

/// Saves and loads fitted pipelines
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSerializer {
    pretty: bool,
}

impl ModelSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented JSON
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn save(&self, pipeline: &FittedPipeline, run_id: Uuid, path: impl AsRef<Path>) -> Result<ModelEnvelope> {
        let path = path.as_ref();
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            run_id,
            metadata: ModelMetadata::from_pipeline(pipeline),
            schema: pipeline.roles.clone(),
            pipeline: pipeline.clone(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let written = self
            .write_envelope(&envelope, &tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(AutoMlError::from));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp).or_else(|e| match e.kind() {
                ErrorKind::NotFound => Ok(()),
                _ => Err(e),
            }) {
                warn!(path = %tmp.display(), error = %cleanup, "Could not remove partial model file");
            }
            return Err(e);
        }

        info!(
            path = %path.display(),
            pipeline = %envelope.metadata.pipeline,
            run_id = %run_id,
            "Model saved"
        );
        Ok(envelope)
    }

    fn write_envelope(&self, envelope: &ModelEnvelope, tmp: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(tmp)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, envelope)?;
        } else {
            serde_json::to_writer(&mut writer, envelope)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<ModelEnvelope> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let envelope: ModelEnvelope = serde_json::from_reader(reader)?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(AutoMlError::SerializationError(format!(
                "{}: unsupported model format version {} (expected {})",
                path.display(),
                envelope.format_version,
                FORMAT_VERSION
            )));
        }
        info!(path = %path.display(), pipeline = %envelope.metadata.pipeline, "Model loaded");
        Ok(envelope)
    }
}
