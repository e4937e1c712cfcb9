//! Integration test: end-to-end experiment (infer → override → load → split → search → evaluate → save → predict)

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};
use titanic_automl::autopipeline::{ColumnInferencer, PipelineNode};
use titanic_automl::context::MlContext;
use titanic_automl::data::{
    sample_passengers, train_test_split, ColumnRole, ColumnRoleSet, DataLoader, ReclassificationRule, TrainTestData,
};
use titanic_automl::error::AutoMlError;
use titanic_automl::experiment::{
    ExperimentConfig, ExperimentConfigBuilder, ExperimentRunner, MonitorState, TrialMonitor, BEST_TRIAL_FILE,
    TRIALS_FILE,
};
use titanic_automl::export::ModelSerializer;
use titanic_automl::inference::BatchPredictor;
use titanic_automl::optimizer::{OptimizeDirection, TunerStrategy};
use titanic_automl::training::{BinaryClassificationMetric, TrainerKind};
use tokio_util::sync::CancellationToken;

struct Prepared {
    _dir: tempfile::TempDir,
    roles: Arc<ColumnRoleSet>,
    split: TrainTestData,
}

fn prepare(n: usize) -> Prepared {
    let (dir, path) = common::write_passenger_csv(n);
    let inference = ColumnInferencer::new().infer_columns(&path, "Survived").unwrap();
    let mut roles = inference.column_roles.clone();
    roles.apply_overrides(&ReclassificationRule::passenger_defaults());
    let df = DataLoader::new(inference.loader_options.clone()).load(&path, &roles).unwrap();
    let split = train_test_split(&df, 0.2, 17).unwrap();
    Prepared {
        _dir: dir,
        roles: Arc::new(roles),
        split,
    }
}

fn builder(data: &Prepared) -> ExperimentConfigBuilder {
    ExperimentConfig::builder()
        .pipeline(PipelineNode::binary_classification(&TrainerKind::ALL))
        .roles(data.roles.clone())
        .label_column("Survived")
        .metric(BinaryClassificationMetric::Accuracy)
        .datasets(&data.split)
}

#[tokio::test]
async fn test_end_to_end_run() {
    let data = prepare(200);
    let ctx = MlContext::with_seed(7).unwrap();
    let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));
    let checkpoints = tempfile::tempdir().unwrap();

    let config = builder(&data)
        .time_budget_secs(60)
        .tuner(TunerStrategy::EciCostFrugal)
        .monitor(monitor.clone())
        .checkpoint_dir(checkpoints.path())
        .max_trials(6)
        .max_concurrent_trials(2)
        .build()
        .unwrap();

    let result = ExperimentRunner::new(config)
        .run(&ctx, CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.cancelled);
    assert_eq!(result.trials.len() + result.failed_trials, 6);
    assert_eq!(monitor.len(), result.trials.len());
    assert_eq!(monitor.state(), MonitorState::Done);

    // the cost-frugal tuner starts each trainer at its defaults
    let tried: Vec<_> = result.trials.iter().filter_map(|t| t.trainer).collect();
    for kind in TrainerKind::ALL {
        assert!(tried.contains(&kind), "{} never tried", kind);
    }

    let best = result.best.clone().expect("a best model");
    assert_eq!(best.record.score, monitor.best_trial().unwrap().score);
    assert!(best.record.score >= 0.8, "best accuracy {}", best.record.score);

    let metrics = best.pipeline.evaluate(&data.split.test_set).unwrap();
    assert!((metrics.accuracy - best.record.score).abs() < 1e-12);

    let log = std::fs::read_to_string(checkpoints.path().join(TRIALS_FILE)).unwrap();
    assert_eq!(log.lines().count(), result.trials.len());
    assert!(checkpoints.path().join(BEST_TRIAL_FILE).exists());

    let model_dir = tempfile::tempdir().unwrap();
    let model_path = model_dir.path().join("model.json");
    ModelSerializer::new().save(&best.pipeline, ctx.run_id(), &model_path).unwrap();
    let loaded = ModelSerializer::new().load(&model_path).unwrap();
    assert_eq!(loaded.run_id, ctx.run_id());

    let outcomes = BatchPredictor::new(Arc::new(loaded.pipeline)).predict_batch(&sample_passengers());
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.is_ok()));

    ctx.shutdown();
}

#[tokio::test]
async fn test_cancel_before_any_trial() {
    let data = prepare(100);
    let ctx = MlContext::with_seed(1).unwrap();
    let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));
    let config = builder(&data)
        .time_budget_secs(30)
        .monitor(monitor.clone())
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = ExperimentRunner::new(config).run(&ctx, cancel).await.unwrap();

    assert!(result.cancelled);
    assert!(result.trials.is_empty());
    assert_eq!(result.failed_trials, 0);
    assert!(result.best.is_none());
    assert!(monitor.is_empty());
    assert_eq!(monitor.state(), MonitorState::Done);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_mid_run_keeps_best_so_far() {
    let data = prepare(150);
    let ctx = MlContext::with_seed(2).unwrap();
    let monitor = Arc::new(TrialMonitor::new(OptimizeDirection::Maximize));
    let config = builder(&data)
        .time_budget_secs(120)
        .tuner(TunerStrategy::Random)
        .max_concurrent_trials(2)
        .monitor(monitor.clone())
        .build()
        .unwrap();

    // cancel as soon as the monitor has seen a completed trial
    let cancel = CancellationToken::new();
    let watcher = {
        let monitor = monitor.clone();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            while monitor.is_empty() && monitor.state() != MonitorState::Done {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            trigger.cancel();
            Instant::now()
        })
    };

    let result = ExperimentRunner::new(config).run(&ctx, cancel).await.unwrap();
    let cancelled_at = watcher.await.unwrap();

    assert!(result.cancelled);
    assert!(!result.trials.is_empty());
    let best = result.best.as_ref().expect("best model kept after cancellation");
    assert!(result.trials.iter().any(|t| t.trial_id == best.record.trial_id));
    let top = result.trials.iter().map(|t| t.score).fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.record.score, top);
    assert_eq!(monitor.state(), MonitorState::Done);
    assert_eq!(monitor.len(), result.trials.len());

    // only the trials already in flight ran after the cancel
    assert!(cancelled_at.elapsed() < Duration::from_secs(10));
    assert!(result.elapsed < Duration::from_secs(30));
}

#[tokio::test]
async fn test_search_stops_when_budget_runs_out() {
    let data = prepare(120);
    let ctx = MlContext::with_seed(4).unwrap();
    let config = builder(&data)
        .time_budget_secs(1)
        .tuner(TunerStrategy::EciCostFrugal)
        .build()
        .unwrap();
    assert!(config.max_trials.is_none());

    let result = ExperimentRunner::new(config)
        .run(&ctx, CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.cancelled);
    assert!(!result.trials.is_empty());
    assert!(result.best.is_some());
    assert!(result.elapsed >= Duration::from_secs(1));

    // one trial launched just before the deadline may still finish after it
    let longest = result.trials.iter().map(|t| t.duration_ms).max().unwrap_or(0);
    let bound = Duration::from_secs(1) + Duration::from_millis(longest) + Duration::from_secs(2);
    assert!(result.elapsed < bound, "elapsed {:?}, bound {:?}", result.elapsed, bound);
}

#[test]
fn test_time_budget_boundaries() {
    let data = prepare(50);
    for secs in [0i64, -1] {
        match builder(&data).time_budget_secs(secs).build() {
            Err(AutoMlError::ConfigurationError(_)) => {}
            other => panic!("budget {} should be rejected, got {:?}", secs, other.map(|_| ())),
        }
    }
    assert!(builder(&data).time_budget_secs(1).build().is_ok());
}

#[test]
fn test_label_absent_from_roles() {
    let data = prepare(50);
    let err = builder(&data).label_column("Survival").time_budget_secs(10).build().unwrap_err();
    assert!(matches!(err, AutoMlError::ConfigurationError(_)));
}

#[test]
fn test_label_with_feature_role_is_configuration_error() {
    let data = prepare(50);
    assert_eq!(data.roles.role_of("Fare"), Some(ColumnRole::Numeric));
    let err = builder(&data).label_column("Fare").time_budget_secs(10).build().unwrap_err();
    assert!(matches!(err, AutoMlError::ConfigurationError(_)));
}

#[test]
fn test_invalid_pipeline_is_configuration_error() {
    let data = prepare(50);
    let err = builder(&data)
        .pipeline(PipelineNode::one_of(vec![]))
        .time_budget_secs(10)
        .build()
        .unwrap_err();
    assert!(matches!(err, AutoMlError::ConfigurationError(_)));
}
