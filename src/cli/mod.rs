//! Titanic AutoML CLI
//!
//! Runs the whole experiment in one go: infer columns, apply overrides, load,
//! split, search, evaluate, save, and score the sample passengers.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::autopipeline::{ColumnInferencer, PipelineNode};
use crate::context::{ContextConfig, MlContext};
use crate::data::{sample_passengers, train_test_split, ColumnRole, ColumnRoleSet, DataLoader, ReclassificationRule};
use crate::error::AutoMlError;
use crate::experiment::{ExperimentConfig, ExperimentResult, ExperimentRunner, TrialMonitor};
use crate::export::ModelSerializer;
use crate::inference::{BatchPredictor, PredictionOutcome};
use crate::optimizer::{format_params, TunerStrategy};
use crate::training::{BinaryClassificationMetric, BinaryClassificationMetrics, TrainerKind};

const SPLIT_STREAM: u64 = 0;
const TOP_TRIALS: usize = 5;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(230, 110, 110) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<14}", key)), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn wait_enter() {
    println!();
    println!("  {}", dim("press enter to exit"));
    let mut input = String::new();
    let _ = std::io::stdin().read_line(&mut input);
}

fn percent(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "titanic-automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Time-boxed AutoML search for Titanic survival classification")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search, evaluate, save and score the sample passengers (default)
    Run,

    /// Score the sample passengers with a saved model
    Predict {
        /// Saved model file
        #[arg(short, long, env = "AUTOML_MODEL", default_value = "model.json")]
        model: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Training data (CSV with header)
    #[arg(short, long, env = "AUTOML_DATA", default_value = "Data/train.csv")]
    pub data: PathBuf,

    /// Label column
    #[arg(long, env = "AUTOML_LABEL", default_value = "Survived")]
    pub label: String,

    /// Where the best model is written
    #[arg(long, env = "AUTOML_MODEL_OUT", default_value = "model.json")]
    pub model_out: PathBuf,

    /// Search budget in seconds
    #[arg(short, long, env = "AUTOML_TIME_BUDGET", default_value_t = 120, allow_negative_numbers = true)]
    pub time_budget: i64,

    /// Optimized metric (accuracy, auc, f1, precision, recall, log_loss)
    #[arg(long, env = "AUTOML_METRIC", default_value_t = BinaryClassificationMetric::Accuracy)]
    pub metric: BinaryClassificationMetric,

    /// Tuner (random, tpe, eci-cost-frugal)
    #[arg(long, env = "AUTOML_TUNER", default_value_t = TunerStrategy::EciCostFrugal)]
    pub tuner: TunerStrategy,

    /// Trainers the search may pick from
    #[arg(long, env = "AUTOML_TRAINERS", value_delimiter = ',', default_values_t = TrainerKind::ALL.to_vec())]
    pub trainers: Vec<TrainerKind>,

    /// Held-out fraction for validation
    #[arg(long, env = "AUTOML_TEST_FRACTION", default_value_t = 0.2)]
    pub test_fraction: f64,

    #[arg(long, env = "AUTOML_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Worker threads for training (defaults to all cores)
    #[arg(long, env = "AUTOML_THREADS")]
    pub threads: Option<usize>,

    #[arg(long, env = "AUTOML_MAX_CONCURRENT_TRIALS", default_value_t = 1)]
    pub max_concurrent_trials: usize,

    /// Stop after this many trials even if budget remains
    #[arg(long, env = "AUTOML_MAX_TRIALS")]
    pub max_trials: Option<usize>,

    /// String columns with more distinct values are treated as free text
    #[arg(long, env = "AUTOML_MAX_CATEGORICAL_UNIQUE", default_value_t = 50)]
    pub max_categorical_unique: usize,

    /// Extra column reclassifications, `Column=role`, applied after the defaults
    #[arg(long = "override", value_delimiter = ',')]
    pub overrides: Vec<ReclassificationRule>,

    /// Skip the built-in PassengerId/Pclass reclassifications
    #[arg(long)]
    pub no_default_overrides: bool,

    /// Write trials.jsonl and best_trial.json here
    #[arg(long, env = "AUTOML_CHECKPOINT_DIR")]
    pub checkpoint_dir: Option<PathBuf>,

    /// Wait for enter before exiting
    #[arg(long)]
    pub pause: bool,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Full experiment; ctrl-c stops the search and keeps the best model so far
pub async fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let mut ctx_config = ContextConfig::new().with_seed(args.seed);
    if let Some(n) = args.threads {
        ctx_config = ctx_config.with_threads(n);
    }
    let ctx = MlContext::new(ctx_config)?;

    line_box_top();
    line_box(&format!("{}", "Titanic AutoML".white().bold()));
    line_box(&kv("run", &ctx.run_id().to_string()));
    line_box(&kv("data", &args.data.display().to_string()));
    line_box(&kv("budget", &format!("{}s", args.time_budget)));
    line_box(&kv("metric", &args.metric.to_string()));
    line_box(&kv("tuner", &args.tuner.to_string()));
    line_box_bottom();

    // Columns
    section("Columns");
    step_run("Inferring column roles");
    let start = Instant::now();
    let inference = ColumnInferencer::new()
        .with_max_categorical_unique(args.max_categorical_unique)
        .infer_columns(&args.data, &args.label)?;
    step_done(&format!("{} columns, {} rows in {:?}", inference.columns.len(), inference.n_rows, start.elapsed()));

    let mut roles = inference.column_roles.clone();
    let mut rules = if args.no_default_overrides {
        Vec::new()
    } else {
        ReclassificationRule::passenger_defaults()
    };
    rules.extend(args.overrides.iter().cloned());
    let report = roles.apply_overrides(&rules);
    for applied in &report.applied {
        step_ok(&format!("{} {} → {}", applied.column, muted(applied.from.as_str()), applied.to));
    }
    for skipped in &report.skipped {
        println!("  {} override for unknown column {}", muted("-"), skipped);
    }
    print_roles(&roles);
    let roles = Arc::new(roles);

    // Data
    section("Data");
    step_run("Loading dataset");
    let start = Instant::now();
    let loader = DataLoader::new(inference.loader_options.clone());
    let df = loader.load(&args.data, &roles)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let split = train_test_split(&df, args.test_fraction, ctx.derive_seed(SPLIT_STREAM))?;
    step_ok(&format!(
        "split {} train / {} validation",
        split.train_set.height(),
        split.test_set.height()
    ));

    // Search
    let pipeline = PipelineNode::binary_classification(&args.trainers);
    let monitor = Arc::new(TrialMonitor::new(args.metric.direction()));
    let mut builder = ExperimentConfig::builder()
        .pipeline(pipeline)
        .roles(roles.clone())
        .label_column(args.label.clone())
        .metric(args.metric)
        .time_budget_secs(args.time_budget)
        .tuner(args.tuner)
        .datasets(&split)
        .monitor(monitor.clone())
        .max_concurrent_trials(args.max_concurrent_trials);
    if let Some(n) = args.max_trials {
        builder = builder.max_trials(n);
    }
    if let Some(dir) = &args.checkpoint_dir {
        builder = builder.checkpoint_dir(dir.clone());
    }
    let config = builder.build()?;

    section("Search");
    println!("  {}", kv("pipeline", &config.pipeline.describe()));
    println!("  {}", dim("ctrl-c stops the search and keeps the best model so far"));
    let cancel = CancellationToken::new();
    let ctrl_c = spawn_ctrl_c_handler(cancel.clone());

    let runner = ExperimentRunner::new(config);
    let result = runner.run(&ctx, cancel).await;
    ctrl_c.abort();
    let result = result?;

    let best = result
        .best
        .clone()
        .ok_or_else(|| AutoMlError::TrainingError("no trial completed within the time budget".to_string()))?;
    print_run_summary(&result);

    // Evaluation
    section("Model quality metrics evaluation");
    let metrics = ctx.install(|| best.pipeline.evaluate(&split.test_set))?;
    print_metrics(&metrics);

    let serializer = ModelSerializer::new().pretty(true);
    serializer.save(&best.pipeline, ctx.run_id(), &args.model_out)?;
    step_ok(&format!("model saved → {}", args.model_out.display()));

    section("Trials");
    print_trials(&monitor, result.metric);

    section("Predictions");
    let predictor = BatchPredictor::new(Arc::new(best.pipeline));
    let passengers = sample_passengers();
    let outcomes = ctx.install(|| predictor.predict_batch(&passengers));
    print_predictions(&outcomes);

    ctx.shutdown();
    if args.pause {
        wait_enter();
    }
    println!();
    Ok(())
}

/// Load a saved model and score the sample passengers
pub fn cmd_predict(model: &Path) -> anyhow::Result<()> {
    section("Predict");
    step_run(&format!("Loading {}", model.display()));
    let envelope = ModelSerializer::new().load(model)?;
    step_done(&format!("{} (run {})", envelope.metadata.pipeline, envelope.run_id));

    let predictor = BatchPredictor::new(Arc::new(envelope.pipeline));
    let outcomes = predictor.predict_batch(&sample_passengers());
    print_predictions(&outcomes);
    println!();
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight trials");
            cancel.cancel();
        }
    })
}

// ─── Output ────────────────────────────────────────────────────────────────────

fn print_roles(roles: &ColumnRoleSet) {
    for role in [
        ColumnRole::Label,
        ColumnRole::Numeric,
        ColumnRole::Categorical,
        ColumnRole::Text,
        ColumnRole::Ignored,
    ] {
        let columns = roles.columns_with(role);
        if !columns.is_empty() {
            println!("  {}", kv(role.as_str(), &columns.join(", ")));
        }
    }
}

fn print_run_summary(result: &ExperimentResult) {
    println!();
    println!("  {}", kv("trials", &result.trials.len().to_string()));
    if result.failed_trials > 0 {
        println!("  {}", kv("failed", &result.failed_trials.to_string()));
    }
    println!("  {}", kv("elapsed", &format!("{:.1?}", result.elapsed)));
    if result.cancelled {
        println!("  {}", "search cancelled".yellow());
    }
    if let Some(best) = &result.best {
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.record.pipeline.white().bold(),
            muted(&format!("{}:", result.metric)),
            best.record.score
        );
        println!("  {}", dim(&format_params(&best.record.params)));
    }
}

fn print_metrics(metrics: &BinaryClassificationMetrics) {
    println!("  {}", kv("Accuracy:", &percent(metrics.accuracy)));
    println!("  {}", kv("Auc:", &percent(metrics.auc)));
    println!("  {}", kv("F1Score:", &percent(metrics.f1_score)));
    println!("  {}", dim(&format!(
        "precision {}  recall {}  log-loss {:.4}",
        percent(metrics.precision),
        percent(metrics.recall),
        metrics.log_loss
    )));
}

fn print_trials(monitor: &TrialMonitor, metric: BinaryClassificationMetric) {
    let trials = monitor.get_completed_trials();
    println!("  {}", kv("completed", &trials.len().to_string()));
    if let Some(best) = monitor.best_trial() {
        println!("  {}", kv("best trial", &format!("#{} {} {:.4}", best.trial_id, best.pipeline, best.score)));
    }
    println!();
    println!("  {:<5} {:<36} {:>10} {:>8}", muted("#"), muted("Pipeline"), muted(metric.as_str()), muted("ms"));
    println!("  {}", dim(&"─".repeat(62)));
    for t in monitor.top_trials(TOP_TRIALS) {
        println!("  {:<5} {:<36} {:>10.4} {:>8}", t.trial_id, t.pipeline, t.score, t.duration_ms);
    }
}

fn print_predictions(outcomes: &[PredictionOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(p) => println!("  {} {}", dim(&format!("{:.3}", p.probability)), outcome),
            Err(_) => println!("  {} {}", bad("!"), outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_defaults_and_categorical_cap() {
        let cli = Cli::try_parse_from(["titanic-automl"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.max_categorical_unique, 50);
        assert_eq!(cli.run.time_budget, 120);

        let cli = Cli::try_parse_from(["titanic-automl", "--max-categorical-unique", "10", "run"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(cli.run.max_categorical_unique, 10);
    }
}
