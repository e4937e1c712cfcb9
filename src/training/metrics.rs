//! Binary classification evaluation

use crate::error::{AutoMlError, Result};
use crate::optimizer::OptimizeDirection;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric the search optimizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryClassificationMetric {
    Accuracy,
    AreaUnderRocCurve,
    F1Score,
    Precision,
    Recall,
    LogLoss,
}

impl BinaryClassificationMetric {
    pub fn direction(&self) -> OptimizeDirection {
        match self {
            BinaryClassificationMetric::LogLoss => OptimizeDirection::Minimize,
            _ => OptimizeDirection::Maximize,
        }
    }

    /// Pick this metric out of a computed set
    pub fn value(&self, metrics: &BinaryClassificationMetrics) -> f64 {
        match self {
            BinaryClassificationMetric::Accuracy => metrics.accuracy,
            BinaryClassificationMetric::AreaUnderRocCurve => metrics.auc,
            BinaryClassificationMetric::F1Score => metrics.f1_score,
            BinaryClassificationMetric::Precision => metrics.precision,
            BinaryClassificationMetric::Recall => metrics.recall,
            BinaryClassificationMetric::LogLoss => metrics.log_loss,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryClassificationMetric::Accuracy => "accuracy",
            BinaryClassificationMetric::AreaUnderRocCurve => "auc",
            BinaryClassificationMetric::F1Score => "f1",
            BinaryClassificationMetric::Precision => "precision",
            BinaryClassificationMetric::Recall => "recall",
            BinaryClassificationMetric::LogLoss => "log_loss",
        }
    }
}

impl Default for BinaryClassificationMetric {
    fn default() -> Self {
        BinaryClassificationMetric::Accuracy
    }
}

impl fmt::Display for BinaryClassificationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinaryClassificationMetric {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "accuracy" => Ok(BinaryClassificationMetric::Accuracy),
            "auc" | "area_under_roc_curve" => Ok(BinaryClassificationMetric::AreaUnderRocCurve),
            "f1" | "f1_score" => Ok(BinaryClassificationMetric::F1Score),
            "precision" => Ok(BinaryClassificationMetric::Precision),
            "recall" => Ok(BinaryClassificationMetric::Recall),
            "log_loss" | "logloss" => Ok(BinaryClassificationMetric::LogLoss),
            other => Err(AutoMlError::InvalidParameter {
                name: "metric".to_string(),
                value: other.to_string(),
                reason: "expected accuracy, auc, f1, precision, recall or log_loss".to_string(),
            }),
        }
    }
}

/// Confusion matrix counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Evaluation of a binary classifier on labeled data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryClassificationMetrics {
    pub accuracy: f64,
    /// Area under the ROC curve; 0.5 when only one class is present
    pub auc: f64,
    pub f1_score: f64,
    pub precision: f64,
    pub recall: f64,
    pub log_loss: f64,
    pub positive_count: usize,
    pub negative_count: usize,
    pub confusion: ConfusionMatrix,
}

impl BinaryClassificationMetrics {
    /// Compute all metrics from 0/1 labels and positive-class probabilities
    pub fn compute(y_true: &Array1<f64>, probabilities: &Array1<f64>, threshold: f64) -> Result<Self> {
        if y_true.len() != probabilities.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", probabilities.len()),
            });
        }
        let n = y_true.len();
        if n == 0 {
            return Err(AutoMlError::TrainingError("cannot evaluate on an empty set".into()));
        }

        let mut confusion = ConfusionMatrix::default();
        for (t, p) in y_true.iter().zip(probabilities.iter()) {
            match (*t > 0.5, *p >= threshold) {
                (true, true) => confusion.true_positives += 1,
                (false, true) => confusion.false_positives += 1,
                (false, false) => confusion.true_negatives += 1,
                (true, false) => confusion.false_negatives += 1,
            }
        }
        let ConfusionMatrix {
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
        } = confusion;

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        let eps = 1e-15;
        let log_loss = -y_true
            .iter()
            .zip(probabilities.iter())
            .map(|(t, p)| {
                let p = p.clamp(eps, 1.0 - eps);
                if *t > 0.5 {
                    p.ln()
                } else {
                    (1.0 - p).ln()
                }
            })
            .sum::<f64>()
            / n as f64;

        Ok(Self {
            accuracy: ratio(tp + tn, n),
            auc: roc_auc(y_true, probabilities),
            f1_score,
            precision,
            recall,
            log_loss,
            positive_count: tp + fn_,
            negative_count: tn + fp,
            confusion,
        })
    }
}

/// Mann-Whitney rank statistic; tied scores share their average rank
fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    let mut pairs: Vec<(f64, bool)> = scores.iter().zip(y_true.iter()).map(|(s, t)| (*s, *t > 0.5)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n_pos = pairs.iter().filter(|(_, pos)| *pos).count();
    let n_neg = pairs.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += avg_rank * pairs[i..=j].iter().filter(|(_, pos)| *pos).count() as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}
