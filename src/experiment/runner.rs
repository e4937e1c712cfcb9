//! Experiment runner
//!
//! Asks the tuner for configurations, trains and scores each one on a blocking
//! thread, and keeps the best fitted pipeline. Stops when the time budget runs
//! out, the trial cap is reached or the cancellation token fires. In-flight
//! trials always finish.

use super::checkpoint::CheckpointWriter;
use super::config::ExperimentConfig;
use super::monitor::spawn_monitor_consumer;
use super::trial::{FailedTrial, TrialEvent, TrialRecord};
use crate::autopipeline::{FittedPipeline, PipelinePlan};
use crate::context::MlContext;
use crate::data::ColumnRoleSet;
use crate::error::{AutoMlError, Result};
use crate::optimizer::{create_tuner, format_params, Tuner, TrialParams};
use crate::training::{BinaryClassificationMetric, BinaryClassificationMetrics, TrainerKind};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const TUNER_STREAM: u64 = 1;
const TRIAL_STREAM_BASE: u64 = 1_000;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Best trial of a run together with its fitted pipeline
#[derive(Debug, Clone)]
pub struct BestModel {
    pub record: TrialRecord,
    pub pipeline: FittedPipeline,
}

#[derive(Debug, Clone)]
pub struct ExperimentResult {
    pub best: Option<BestModel>,
    /// Completed trials in completion order
    pub trials: Vec<TrialRecord>,
    pub failed_trials: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub metric: BinaryClassificationMetric,
}

impl ExperimentResult {
    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.record.score)
    }
}

/// Everything a trial needs off the async runtime
struct TrialJob {
    trial_id: u64,
    plan: PipelinePlan,
    train_set: Arc<DataFrame>,
    validation_set: Arc<DataFrame>,
    roles: Arc<ColumnRoleSet>,
    metric: BinaryClassificationMetric,
    seed: u64,
    ctx: MlContext,
}

struct TrialSuccess {
    pipeline: FittedPipeline,
    metrics: BinaryClassificationMetrics,
    score: f64,
}

struct TrialOutput {
    trial_id: u64,
    result: Result<TrialSuccess>,
    duration: Duration,
}

impl TrialJob {
    fn run(self) -> TrialOutput {
        let start = Instant::now();
        let Self {
            trial_id,
            plan,
            train_set,
            validation_set,
            roles,
            metric,
            seed,
            ctx,
        } = self;

        let result = ctx.install(|| {
            let pipeline = plan.fit(&train_set, &roles, seed)?;
            let metrics = pipeline.evaluate(&validation_set)?;
            let score = metric.value(&metrics);
            if !score.is_finite() {
                return Err(AutoMlError::TrainingError(format!("{} is not finite", metric)));
            }
            Ok(TrialSuccess {
                pipeline,
                metrics,
                score,
            })
        });

        TrialOutput {
            trial_id,
            result,
            duration: start.elapsed(),
        }
    }
}

/// Bookkeeping for a launched trial
struct PendingTrial {
    trial_id: u64,
    description: String,
    params: TrialParams,
    trainer: Option<TrainerKind>,
}

pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Run the search until the budget is spent or `cancel` fires
    pub async fn run(&self, ctx: &MlContext, cancel: CancellationToken) -> Result<ExperimentResult> {
        let config = &self.config;
        let start = Instant::now();
        let deadline = start + config.time_budget;
        let direction = config.direction();
        let seed_of = |stream: u64| match config.seed {
            Some(seed) => MlContext::mix_seed(seed, stream),
            None => ctx.derive_seed(stream),
        };

        let mut tuner: Box<dyn Tuner> = create_tuner(config.tuner, config.pipeline.search_space(), seed_of(TUNER_STREAM));
        let checkpoint = config
            .checkpoint_dir
            .as_ref()
            .map(CheckpointWriter::create)
            .transpose()?;

        let (events, consumer) = match &config.monitor {
            Some(monitor) => {
                let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
                (Some(tx), Some(spawn_monitor_consumer(monitor.clone(), rx)))
            }
            None => (None, None),
        };

        info!(
            pipeline = %config.pipeline.describe(),
            metric = %config.metric,
            tuner = %config.tuner,
            budget_secs = config.time_budget.as_secs(),
            max_concurrent = config.max_concurrent_trials,
            "Experiment started"
        );

        let mut in_flight: JoinSet<TrialOutput> = JoinSet::new();
        let mut pending: HashMap<Id, PendingTrial> = HashMap::new();
        let mut trials: Vec<TrialRecord> = Vec::new();
        let mut best: Option<BestModel> = None;
        let mut failed_trials = 0;
        let mut launched = 0u64;
        let mut cancelled = false;

        loop {
            while in_flight.len() < config.max_concurrent_trials {
                if cancel.is_cancelled() {
                    if !cancelled {
                        info!(launched, "Cancellation requested; no further trials");
                    }
                    cancelled = true;
                    break;
                }
                if Instant::now() >= deadline {
                    break;
                }
                if config.max_trials.is_some_and(|max| launched as usize >= max) {
                    break;
                }

                launched += 1;
                let trial_id = launched;
                let params = tuner.suggest();
                let plan = match config.pipeline.resolve(&params) {
                    Ok(plan) => plan,
                    Err(e) => {
                        warn!(trial_id, error = %e, "Trial configuration could not be resolved");
                        tuner.observe(&params, f64::INFINITY, 0.0);
                        failed_trials += 1;
                        let failed = FailedTrial {
                            trial_id,
                            pipeline: config.pipeline.describe(),
                            params,
                            reason: e.to_string(),
                        };
                        send_event(&events, TrialEvent::Failed(failed)).await;
                        continue;
                    }
                };

                debug!(trial_id, pipeline = %plan.describe(), params = %format_params(&params), "Trial launched");
                let job = TrialJob {
                    trial_id,
                    plan: plan.clone(),
                    train_set: config.train_set.clone(),
                    validation_set: config.validation_set.clone(),
                    roles: config.roles.clone(),
                    metric: config.metric,
                    seed: seed_of(TRIAL_STREAM_BASE + trial_id),
                    ctx: ctx.clone(),
                };
                let handle = in_flight.spawn_blocking(move || job.run());
                pending.insert(
                    handle.id(),
                    PendingTrial {
                        trial_id,
                        description: plan.describe(),
                        trainer: plan.trainer_kind(),
                        params,
                    },
                );
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };

            let (task_id, output) = match joined {
                Ok((id, output)) => (id, Ok(output)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(trial) = pending.remove(&task_id) else {
                error!("Finished trial task has no bookkeeping entry");
                continue;
            };

            let output = match output {
                Ok(output) => output,
                Err(join_err) => TrialOutput {
                    trial_id: trial.trial_id,
                    result: Err(AutoMlError::TrainingError(format!("trial task failed: {}", join_err))),
                    duration: Duration::ZERO,
                },
            };

            let cost_secs = output.duration.as_secs_f64();
            match output.result {
                Ok(success) => {
                    tuner.observe(&trial.params, direction.to_loss(success.score), cost_secs);
                    let record = TrialRecord::new(
                        output.trial_id,
                        trial.description,
                        trial.trainer,
                        trial.params,
                        success.score,
                        success.metrics,
                        output.duration.as_millis() as u64,
                    )
                    .with_sequence(trials.len() as u64 + 1);

                    info!(
                        trial_id = record.trial_id,
                        pipeline = %record.pipeline,
                        score = record.score,
                        duration_ms = record.duration_ms,
                        "Trial completed"
                    );

                    if let Some(writer) = &checkpoint {
                        if let Err(e) = writer.append(&record) {
                            warn!(trial_id = record.trial_id, error = %e, "Checkpoint append failed");
                        }
                    }

                    let improves = best
                        .as_ref()
                        .map_or(true, |b| direction.is_better(record.score, b.record.score));
                    if improves {
                        info!(trial_id = record.trial_id, score = record.score, "New best trial");
                        best = Some(BestModel {
                            record: record.clone(),
                            pipeline: success.pipeline,
                        });
                    }

                    send_event(&events, TrialEvent::Completed(record.clone())).await;
                    trials.push(record);
                }
                Err(e) => {
                    warn!(trial_id = trial.trial_id, pipeline = %trial.description, error = %e, "Trial failed");
                    tuner.observe(&trial.params, f64::INFINITY, cost_secs);
                    failed_trials += 1;
                    let failed = FailedTrial {
                        trial_id: trial.trial_id,
                        pipeline: trial.description,
                        params: trial.params,
                        reason: e.to_string(),
                    };
                    send_event(&events, TrialEvent::Failed(failed)).await;
                }
            }
        }

        drop(events);
        if let Some(consumer) = consumer {
            match consumer.await {
                Ok(received) => debug!(received, "Trial monitor drained"),
                Err(e) => warn!(error = %e, "Trial monitor task failed"),
            }
        }
        if let Some(monitor) = &config.monitor {
            monitor.complete();
        }
        if let (Some(writer), Some(b)) = (&checkpoint, &best) {
            if let Err(e) = writer.write_best(&b.record) {
                warn!(error = %e, "Could not write best trial checkpoint");
            }
        }

        let elapsed = start.elapsed();
        info!(
            completed = trials.len(),
            failed = failed_trials,
            cancelled,
            best_score = best.as_ref().map(|b| b.record.score),
            elapsed_ms = elapsed.as_millis() as u64,
            "Experiment finished"
        );

        Ok(ExperimentResult {
            best,
            trials,
            failed_trials,
            cancelled,
            elapsed,
            metric: config.metric,
        })
    }
}

async fn send_event(events: &Option<mpsc::Sender<TrialEvent>>, event: TrialEvent) {
    if let Some(tx) = events {
        if tx.send(event).await.is_err() {
            warn!("Trial monitor is gone; event dropped");
        }
    }
}
