//! Integration test: trial monitor under concurrent reporting

use ndarray::array;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use titanic_automl::experiment::{spawn_monitor_consumer, TrialEvent, TrialMonitor, TrialObserver, TrialRecord};
use titanic_automl::optimizer::OptimizeDirection;
use titanic_automl::training::BinaryClassificationMetrics;
use tokio::sync::mpsc;

fn record(trial_id: u64, score: f64) -> TrialRecord {
    let metrics = BinaryClassificationMetrics::compute(&array![1.0, 0.0], &array![0.6, 0.3], 0.5).unwrap();
    TrialRecord::new(trial_id, "featurize > fast_tree", None, Default::default(), score, metrics, 1)
}

#[test]
fn test_concurrent_direct_reports() {
    let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));
    let threads = 8;
    let per_thread = 50;

    std::thread::scope(|s| {
        for t in 0..threads {
            let monitor = monitor.clone();
            s.spawn(move || {
                for k in 0..per_thread {
                    let id = (t * per_thread + k) as u64;
                    monitor.on_trial_completed(record(id, id as f64 / 1000.0)).unwrap();
                }
            });
        }
    });

    let trials = monitor.get_completed_trials();
    assert_eq!(trials.len(), threads * per_thread);

    let ids: HashSet<u64> = trials.iter().map(|r| r.trial_id).collect();
    assert_eq!(ids.len(), trials.len());

    let sequences: Vec<u64> = trials.iter().map(|r| r.sequence).collect();
    let expected: Vec<u64> = (1..=trials.len() as u64).collect();
    assert_eq!(sequences, expected);

    assert_eq!(monitor.best_trial().unwrap().trial_id, (threads * per_thread - 1) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_senders_no_loss_no_duplication() {
    let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));
    let (tx, rx) = mpsc::channel(16);
    let consumer = spawn_monitor_consumer(monitor.clone(), rx);

    let senders = 6;
    let per_sender = 40;
    let mut tasks = Vec::new();
    for s in 0..senders {
        let tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            for k in 0..per_sender {
                let id = (s * per_sender + k) as u64;
                tx.send(TrialEvent::Completed(record(id, 0.5))).await.unwrap();
            }
        }));
    }
    drop(tx);
    for t in tasks {
        t.await.unwrap();
    }

    assert_eq!(consumer.await.unwrap(), senders * per_sender);
    monitor.complete();

    let trials = monitor.get_completed_trials();
    assert_eq!(trials.len(), senders * per_sender);
    let ids: HashSet<u64> = trials.iter().map(|r| r.trial_id).collect();
    assert_eq!(ids.len(), senders * per_sender);

    // per-sender order survives the channel
    for s in 0..senders as u64 {
        let lo = s * per_sender as u64;
        let hi = lo + per_sender as u64;
        let mine: Vec<u64> = trials
            .iter()
            .map(|r| r.trial_id)
            .filter(|id| (lo..hi).contains(id))
            .collect();
        assert!(mine.windows(2).all(|w| w[0] < w[1]));
    }
}

proptest! {
    #[test]
    fn prop_log_keeps_receipt_order(scores in prop::collection::vec(0.0f64..1.0, 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));

        let received = rt.block_on(async {
            let (tx, rx) = mpsc::channel(4);
            let consumer = spawn_monitor_consumer(monitor.clone(), rx);
            for (i, s) in scores.iter().enumerate() {
                tx.send(TrialEvent::Completed(record(i as u64, *s))).await.unwrap();
            }
            drop(tx);
            consumer.await.unwrap()
        });

        prop_assert_eq!(received, scores.len());
        let logged: Vec<f64> = monitor.get_completed_trials().iter().map(|r| r.score).collect();
        prop_assert_eq!(&logged, &scores);

        let best = monitor.best_trial().map(|r| r.score);
        let expected = scores.iter().copied().fold(None, |acc: Option<f64>, s| match acc {
            Some(b) if b >= s => Some(b),
            _ => Some(s),
        });
        prop_assert_eq!(best, expected);
    }
}
