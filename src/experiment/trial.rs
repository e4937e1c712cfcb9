//! Trial records and the events the runner emits

use crate::optimizer::{format_params, TrialParams};
use crate::training::{BinaryClassificationMetrics, TrainerKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One completed trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Position in the log, assigned on append (1-based, 0 = not yet appended)
    pub sequence: u64,
    /// Id the runner gave the trial when it was launched
    pub trial_id: u64,
    /// e.g. `featurize > lightgbm`
    pub pipeline: String,
    pub trainer: Option<TrainerKind>,
    pub params: TrialParams,
    /// Value of the optimized metric on the validation split
    pub score: f64,
    pub metrics: BinaryClassificationMetrics,
    pub duration_ms: u64,
}

impl TrialRecord {
    pub fn new(
        trial_id: u64,
        pipeline: impl Into<String>,
        trainer: Option<TrainerKind>,
        params: TrialParams,
        score: f64,
        metrics: BinaryClassificationMetrics,
        duration_ms: u64,
    ) -> Self {
        Self {
            sequence: 0,
            trial_id,
            pipeline: pipeline.into(),
            trainer,
            params,
            score,
            metrics,
            duration_ms,
        }
    }

    /// Copy with the log position filled in
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

impl fmt::Display for TrialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<3} {:<36} score={:.4} ({} ms) {}",
            self.trial_id,
            self.pipeline,
            self.score,
            self.duration_ms,
            format_params(&self.params)
        )
    }
}

/// Trial that could not be trained or scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTrial {
    pub trial_id: u64,
    pub pipeline: String,
    pub params: TrialParams,
    pub reason: String,
}

/// What the runner reports to the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrialEvent {
    Completed(TrialRecord),
    Failed(FailedTrial),
}

impl TrialEvent {
    pub fn trial_id(&self) -> u64 {
        match self {
            TrialEvent::Completed(r) => r.trial_id,
            TrialEvent::Failed(f) => f.trial_id,
        }
    }
}
