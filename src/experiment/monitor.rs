//! Trial monitor
//!
//! Append-only log of completed trials with best-trial tracking. The runner
//! never calls the monitor directly: it sends [`TrialEvent`]s over a channel
//! that [`spawn_monitor_consumer`] drains on its own task.

use super::trial::{FailedTrial, TrialEvent, TrialRecord};
use crate::error::{AutoMlError, Result};
use crate::optimizer::OptimizeDirection;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver of trial outcomes
pub trait TrialObserver: Send + Sync {
    /// Record a completed trial, returning it with its log position
    fn on_trial_completed(&self, trial: TrialRecord) -> Result<TrialRecord>;

    fn on_trial_failed(&self, _trial: &FailedTrial) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Created,
    Running,
    Done,
}

#[derive(Debug)]
struct MonitorLog {
    state: MonitorState,
    completed: Vec<TrialRecord>,
    failed: usize,
    best: Option<usize>,
}

/// Thread-safe trial log
#[derive(Debug)]
pub struct TrialMonitor {
    direction: OptimizeDirection,
    log: Mutex<MonitorLog>,
}

impl TrialMonitor {
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            direction,
            log: Mutex::new(MonitorLog {
                state: MonitorState::Created,
                completed: Vec::new(),
                failed: 0,
                best: None,
            }),
        }
    }

    pub fn direction(&self) -> OptimizeDirection {
        self.direction
    }

    pub fn state(&self) -> MonitorState {
        self.log.lock().state
    }

    /// Snapshot of the log in completion order
    pub fn get_completed_trials(&self) -> Vec<TrialRecord> {
        self.log.lock().completed.clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed_count(&self) -> usize {
        self.log.lock().failed
    }

    /// Highest-scoring trial per the metric direction; ties keep the earlier one
    pub fn best_trial(&self) -> Option<TrialRecord> {
        let log = self.log.lock();
        log.best.map(|i| log.completed[i].clone())
    }

    /// The `n` best trials, best first
    pub fn top_trials(&self, n: usize) -> Vec<TrialRecord> {
        let mut trials = self.get_completed_trials();
        let direction = self.direction;
        trials.sort_by(|a, b| {
            direction
                .to_loss(a.score)
                .total_cmp(&direction.to_loss(b.score))
                .then(a.sequence.cmp(&b.sequence))
        });
        trials.truncate(n);
        trials
    }

    /// Freeze the log; later appends are rejected
    pub fn complete(&self) {
        let mut log = self.log.lock();
        if log.state != MonitorState::Done {
            log.state = MonitorState::Done;
            info!(
                completed = log.completed.len(),
                failed = log.failed,
                "Trial monitor closed"
            );
        }
    }

    fn ensure_open(log: &mut MonitorLog) -> Result<()> {
        match log.state {
            MonitorState::Done => Err(AutoMlError::MonitorError(
                "trial reported after the monitor was completed".to_string(),
            )),
            MonitorState::Created => {
                log.state = MonitorState::Running;
                Ok(())
            }
            MonitorState::Running => Ok(()),
        }
    }
}

impl TrialObserver for TrialMonitor {
    fn on_trial_completed(&self, trial: TrialRecord) -> Result<TrialRecord> {
        let mut log = self.log.lock();
        Self::ensure_open(&mut log)?;

        let record = trial.with_sequence(log.completed.len() as u64 + 1);
        let is_best = match log.best {
            None => true,
            Some(i) => self.direction.is_better(record.score, log.completed[i].score),
        };
        if is_best {
            log.best = Some(log.completed.len());
        }
        log.completed.push(record.clone());

        debug!(
            sequence = record.sequence,
            trial_id = record.trial_id,
            score = record.score,
            is_best,
            "Trial recorded"
        );
        Ok(record)
    }

    fn on_trial_failed(&self, trial: &FailedTrial) -> Result<()> {
        let mut log = self.log.lock();
        Self::ensure_open(&mut log)?;
        log.failed += 1;
        debug!(trial_id = trial.trial_id, reason = %trial.reason, "Trial failure recorded");
        Ok(())
    }
}

/// Drain `rx` into `observer` until every sender is dropped.
///
/// Observer errors are logged and swallowed. The task resolves to the number of
/// events received.
pub fn spawn_monitor_consumer(
    observer: Arc<dyn TrialObserver>,
    mut rx: mpsc::Receiver<TrialEvent>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut received = 0;
        while let Some(event) = rx.recv().await {
            received += 1;
            let trial_id = event.trial_id();
            let outcome = match event {
                TrialEvent::Completed(record) => observer.on_trial_completed(record).map(|_| ()),
                TrialEvent::Failed(failed) => observer.on_trial_failed(&failed),
            };
            if let Err(e) = outcome {
                warn!(trial_id, error = %e, "Trial monitor rejected event");
            }
        }
        debug!(received, "Trial event channel closed");
        received
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::BinaryClassificationMetrics;
    use ndarray::array;

    fn record(trial_id: u64, score: f64) -> TrialRecord {
        let metrics = BinaryClassificationMetrics::compute(&array![1.0, 0.0], &array![0.7, 0.2], 0.5).unwrap();
        TrialRecord::new(trial_id, "featurize > lightgbm", None, Default::default(), score, metrics, 5)
    }

    #[test]
    fn test_sequence_and_best() {
        let monitor = TrialMonitor::new(OptimizeDirection::Maximize);
        assert_eq!(monitor.state(), MonitorState::Created);

        monitor.on_trial_completed(record(1, 0.70)).unwrap();
        monitor.on_trial_completed(record(2, 0.82)).unwrap();
        let third = monitor.on_trial_completed(record(3, 0.82)).unwrap();
        assert_eq!(third.sequence, 3);
        assert_eq!(monitor.state(), MonitorState::Running);

        assert_eq!(monitor.best_trial().unwrap().trial_id, 2);
        let top: Vec<u64> = monitor.top_trials(2).iter().map(|r| r.trial_id).collect();
        assert_eq!(top, vec![2, 3]);
    }

    #[test]
    fn test_minimize_direction() {
        let monitor = TrialMonitor::new(OptimizeDirection::Minimize);
        monitor.on_trial_completed(record(1, 0.4)).unwrap();
        monitor.on_trial_completed(record(2, 0.3)).unwrap();
        assert_eq!(monitor.best_trial().unwrap().trial_id, 2);
    }

    #[test]
    fn test_append_after_complete_is_rejected() {
        let monitor = TrialMonitor::new(OptimizeDirection::Maximize);
        monitor.on_trial_completed(record(1, 0.5)).unwrap();
        monitor.complete();
        let err = monitor.on_trial_completed(record(2, 0.9)).unwrap_err();
        assert!(matches!(err, AutoMlError::MonitorError(_)));
        assert_eq!(monitor.len(), 1);
        assert_eq!(monitor.state(), MonitorState::Done);
    }

    #[tokio::test]
    async fn test_consumer_swallows_errors() {
        let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));
        monitor.complete();

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_monitor_consumer(monitor.clone(), rx);
        tx.send(TrialEvent::Completed(record(1, 0.5))).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 1);
        assert!(monitor.is_empty());
    }
}
