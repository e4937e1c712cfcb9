//! Explicit ML session
//!
//! Every stage of the experiment receives an `MlContext` by reference instead of
//! reaching for process-wide state. The context owns the random seed, the rayon
//! pool used for CPU-bound work and the run identifier stamped on artifacts.
//! The orchestrator creates it at startup and calls [`MlContext::shutdown`] last.

use crate::error::{AutoMlError, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Configuration for the ML session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Root random seed; every derived generator is seeded from it
    pub seed: u64,
    /// Number of worker threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_threads: None,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }
}

/// Session object threaded through loading, search, evaluation and prediction
#[derive(Debug, Clone)]
pub struct MlContext {
    config: ContextConfig,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    pool: Arc<rayon::ThreadPool>,
}

impl MlContext {
    /// Create a new session
    pub fn new(config: ContextConfig) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("automl-worker-{}", i));
        if let Some(n) = config.n_threads {
            if n == 0 {
                return Err(AutoMlError::ConfigurationError(
                    "thread count must be at least 1".to_string(),
                ));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| AutoMlError::ConfigurationError(e.to_string()))?;

        let ctx = Self {
            config,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            pool: Arc::new(pool),
        };
        info!(
            run_id = %ctx.run_id,
            seed = ctx.config.seed,
            threads = ctx.num_threads(),
            "ML context created"
        );
        Ok(ctx)
    }

    /// Session with default configuration and the given seed
    pub fn with_seed(seed: u64) -> Result<Self> {
        Self::new(ContextConfig::new().with_seed(seed))
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Deterministic seed for a named sub-stream (split, tuner, trial n, ...)
    pub fn derive_seed(&self, stream: u64) -> u64 {
        Self::mix_seed(self.config.seed, stream)
    }

    /// splitmix64 step; neighbouring streams come out decorrelated
    pub fn mix_seed(seed: u64, stream: u64) -> u64 {
        let mut z = seed.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Seeded generator for a sub-stream
    pub fn rng(&self, stream: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(self.derive_seed(stream))
    }

    /// Run CPU-bound work inside the session's thread pool
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    /// Tear down the session
    pub fn shutdown(self) {
        let elapsed = Utc::now() - self.started_at;
        info!(
            run_id = %self.run_id,
            elapsed_ms = elapsed.num_milliseconds(),
            "ML context shut down"
        );
    }
}
