//! AutoML experiment
//!
//! - Validated, immutable experiment configuration
//! - Async search loop bounded by a time budget and a cancellation token
//! - Trial monitor fed over a channel
//! - Optional JSON-lines trial checkpoints

mod checkpoint;
mod config;
mod monitor;
mod runner;
mod trial;

pub use checkpoint::{CheckpointWriter, BEST_TRIAL_FILE, TRIALS_FILE};
pub use config::{ExperimentConfig, ExperimentConfigBuilder};
pub use monitor::{spawn_monitor_consumer, MonitorState, TrialMonitor, TrialObserver};
pub use runner::{BestModel, ExperimentResult, ExperimentRunner};
pub use trial::{FailedTrial, TrialEvent, TrialRecord};
