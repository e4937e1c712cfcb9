//! Per-record batch prediction
//!
//! Every record is validated, conformed and scored on its own, so one bad
//! record yields an error in its own slot and nowhere else. Output order is
//! input order.

use crate::autopipeline::FittedPipeline;
use crate::data::{conform_scoring_frame, passengers_to_frame, Passenger};
use crate::error::{AutoMlError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Prediction for one passenger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub passenger_id: i64,
    pub name: String,
    pub predicted_label: bool,
    /// Positive-class probability
    pub probability: f64,
    /// Raw margin before the sigmoid
    pub score: f64,
}

/// One slot of a batch: the record's identity and what happened to it
#[derive(Debug)]
pub struct PredictionOutcome {
    pub passenger_id: i64,
    pub name: String,
    pub result: Result<PredictionResult>,
}

impl PredictionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for PredictionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(p) => write!(f, "Id:{} Name:{} Survived:{}", p.passenger_id, p.name, p.predicted_label),
            Err(e) => write!(f, "Id:{} Name:{} Error:{}", self.passenger_id, self.name, e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchPredictor {
    pipeline: Arc<FittedPipeline>,
}

impl BatchPredictor {
    pub fn new(pipeline: Arc<FittedPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &FittedPipeline {
        &self.pipeline
    }

    /// Score every record independently; one outcome per input, same order
    pub fn predict_batch(&self, passengers: &[Passenger]) -> Vec<PredictionOutcome> {
        let start = Instant::now();
        let outcomes: Vec<PredictionOutcome> = passengers
            .par_iter()
            .map(|p| PredictionOutcome {
                passenger_id: p.passenger_id,
                name: p.name.clone(),
                result: self.predict_one(p),
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        if failed > 0 {
            warn!(failed, total = outcomes.len(), "Some records could not be scored");
        }
        debug!(
            records = outcomes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch scored"
        );
        outcomes
    }

    /// Score one record; any failure is reported against its id
    pub fn predict_one(&self, passenger: &Passenger) -> Result<PredictionResult> {
        self.score(passenger).map_err(|e| match e {
            AutoMlError::PredictionError { .. } => e,
            other => AutoMlError::PredictionError {
                record_id: passenger.passenger_id,
                reason: other.to_string(),
            },
        })
    }

    fn score(&self, passenger: &Passenger) -> Result<PredictionResult> {
        passenger.validate()?;
        let frame = passengers_to_frame(std::slice::from_ref(passenger))?;
        let frame = conform_scoring_frame(&frame, &self.pipeline.roles)?;

        let x = self.pipeline.featurizer.transform(&frame)?;
        let margin = self.pipeline.classifier.decision_function(&x)?;
        let probability = self.pipeline.classifier.predict_proba(&x)?;
        let (Some(&score), Some(&probability)) = (margin.first(), probability.first()) else {
            return Err(AutoMlError::PredictionError {
                record_id: passenger.passenger_id,
                reason: "model returned no output".to_string(),
            });
        };
        if !probability.is_finite() {
            return Err(AutoMlError::PredictionError {
                record_id: passenger.passenger_id,
                reason: format!("non-finite probability {}", probability),
            });
        }

        Ok(PredictionResult {
            passenger_id: passenger.passenger_id,
            name: passenger.name.clone(),
            predicted_label: probability >= self.pipeline.threshold,
            probability,
            score,
        })
    }
}
