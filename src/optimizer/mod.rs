//! Hyperparameter optimization module
//!
//! Provides the search machinery the experiment runner drives:
//! - Conditional, namespaced search spaces with low-cost defaults
//! - Random search
//! - Tree-structured Parzen Estimators (TPE)
//! - Estimated-cost-for-improvement arm selection with cost-frugal local search

mod config;
mod samplers;
mod search_space;
mod tuner;

pub use config::{OptimizeDirection, TunerStrategy};
pub use samplers::{RandomSampler, Sampler, TPESampler};
pub use search_space::{
    format_params, strip_prefix, ParamCondition, Parameter, ParameterType, ParameterValue, SearchSpace,
    TrialParams,
};
pub use tuner::{create_tuner, EciCostFrugalTuner, SamplerTuner, Tuner};
