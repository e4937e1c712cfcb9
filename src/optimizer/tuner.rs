//! Suggest/observe tuners driving the experiment search loop
//!
//! A tuner hands out configurations and is told how each one fared. Losses are
//! direction-normalized (lower is better); a failed trial is reported as
//! `f64::INFINITY`. Observations may arrive out of order when trials run
//! concurrently.

use super::config::TunerStrategy;
use super::samplers::{RandomSampler, Sampler, TPESampler};
use super::search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashMap;
use tracing::debug;

/// Stateful search strategy
pub trait Tuner: Send {
    /// Next configuration to evaluate
    fn suggest(&mut self) -> TrialParams;

    /// Report the loss and wall-clock cost of an evaluated configuration
    fn observe(&mut self, params: &TrialParams, loss: f64, cost_secs: f64);

    fn strategy(&self) -> TunerStrategy;
}

/// Create a tuner for the given strategy
pub fn create_tuner(strategy: TunerStrategy, space: SearchSpace, seed: u64) -> Box<dyn Tuner> {
    match strategy {
        TunerStrategy::Random => Box::new(SamplerTuner::new(space, Box::new(RandomSampler::new(seed)), strategy)),
        TunerStrategy::Tpe => Box::new(SamplerTuner::new(space, Box::new(TPESampler::new(seed)), strategy)),
        TunerStrategy::EciCostFrugal => Box::new(EciCostFrugalTuner::new(space, seed)),
    }
}

/// Adapts a history-driven [`Sampler`] to the suggest/observe protocol
pub struct SamplerTuner {
    space: SearchSpace,
    sampler: Box<dyn Sampler>,
    history: Vec<(TrialParams, f64)>,
    strategy: TunerStrategy,
}

impl SamplerTuner {
    pub fn new(space: SearchSpace, sampler: Box<dyn Sampler>, strategy: TunerStrategy) -> Self {
        Self {
            space,
            sampler,
            history: Vec::new(),
            strategy,
        }
    }
}

impl Tuner for SamplerTuner {
    fn suggest(&mut self) -> TrialParams {
        self.sampler.sample(&self.space, &self.history)
    }

    fn observe(&mut self, params: &TrialParams, loss: f64, _cost_secs: f64) {
        self.history.push((params.clone(), loss));
    }

    fn strategy(&self) -> TunerStrategy {
        self.strategy
    }
}

const INITIAL_STEP: f64 = 0.1;
const MIN_STEP: f64 = 1e-3;
/// Added to every score gap so the current best arm keeps a finite ECI
const GAP_FLOOR: f64 = 0.01;

/// Local-search state for one trainer arm
#[derive(Debug)]
struct ArmState {
    /// Value of the arm parameter, `None` for a space without arms
    choice: Option<String>,
    /// Parameter name -> coordinate in the arm's normalized space
    coords: HashMap<String, usize>,
    started: bool,
    best_point: Option<Vec<f64>>,
    best_loss: f64,
    step: f64,
    stalls: usize,
    opposite: Option<Vec<f64>>,
    n_observed: usize,
    total_cost: f64,
}

impl ArmState {
    fn dim(&self) -> usize {
        self.coords.len()
    }

    fn avg_cost(&self) -> f64 {
        if self.n_observed == 0 {
            1.0
        } else {
            (self.total_cost / self.n_observed as f64).max(1e-3)
        }
    }
}

/// Cost-frugal tuner.
///
/// Every trainer arm is first tried at its low-cost defaults. Afterwards an arm
/// is drawn with probability inversely proportional to its estimated cost for
/// improvement (observed training time times the gap to the global best), and
/// a randomized direct search step is taken around that arm's incumbent in the
/// normalized `[0, 1]^d` space. The step halves after `2d` consecutive
/// non-improving proposals.
pub struct EciCostFrugalTuner {
    space: SearchSpace,
    arm_param: Option<String>,
    arms: Vec<ArmState>,
    best_loss: f64,
    rng: Xoshiro256PlusPlus,
}

impl EciCostFrugalTuner {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        let arm_param = find_arm_parameter(&space).map(|p| p.name.clone());

        let choices: Vec<Option<String>> = match arm_param.as_deref().and_then(|n| space.get(n)) {
            Some(p) => p.choices().unwrap_or_default().iter().cloned().map(Some).collect(),
            None => vec![None],
        };

        let arms = choices
            .into_iter()
            .map(|choice| {
                let coords = space
                    .parameters()
                    .iter()
                    .filter(|p| Some(&p.name) != arm_param.as_ref())
                    .filter(|p| match (&p.condition, &choice, &arm_param) {
                        (None, _, _) => true,
                        (Some(cond), Some(c), Some(arm)) if &cond.parent == arm => &cond.value == c,
                        // nested condition; materialization decides activity
                        (Some(_), _, _) => true,
                    })
                    .enumerate()
                    .map(|(i, p)| (p.name.clone(), i))
                    .collect();
                ArmState {
                    choice,
                    coords,
                    started: false,
                    best_point: None,
                    best_loss: f64::INFINITY,
                    step: INITIAL_STEP,
                    stalls: 0,
                    opposite: None,
                    n_observed: 0,
                    total_cost: 0.0,
                }
            })
            .collect();

        Self {
            space,
            arm_param,
            arms,
            best_loss: f64::INFINITY,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    fn arm_index(&self, params: &TrialParams) -> Option<usize> {
        match &self.arm_param {
            None => Some(0),
            Some(name) => {
                let value = params.get(name)?.as_string()?;
                self.arms.iter().position(|a| a.choice.as_deref() == Some(value))
            }
        }
    }

    /// Turn an arm point into a configuration; params outside the arm get defaults
    fn materialize(&self, arm: usize, point: Option<&[f64]>) -> TrialParams {
        let state = &self.arms[arm];
        self.space.fill(|p| {
            if Some(&p.name) == self.arm_param.as_ref() {
                if let Some(choice) = &state.choice {
                    return ParameterValue::String(choice.clone());
                }
            }
            match (point, state.coords.get(&p.name)) {
                (Some(point), Some(&i)) => p.from_unit(point[i]),
                _ => p.default_value(),
            }
        })
    }

    fn to_point(&self, arm: usize, params: &TrialParams) -> Vec<f64> {
        let state = &self.arms[arm];
        let mut point = vec![0.0; state.dim()];
        for (name, &i) in &state.coords {
            if let Some(param) = self.space.get(name) {
                let value = params.get(name).cloned().unwrap_or_else(|| param.default_value());
                point[i] = param.to_unit(&value);
            }
        }
        point
    }

    fn choose_arm(&mut self) -> usize {
        let weights: Vec<f64> = self
            .arms
            .iter()
            .map(|a| {
                let gap = if a.best_loss.is_finite() && self.best_loss.is_finite() {
                    (a.best_loss - self.best_loss).max(0.0)
                } else {
                    1e3
                };
                let eci = a.avg_cost() * (gap + GAP_FLOOR);
                1.0 / eci
            })
            .collect();

        let total: f64 = weights.iter().sum();
        let mut r = self.rng.gen::<f64>() * total;
        for (i, w) in weights.iter().enumerate() {
            if r < *w {
                return i;
            }
            r -= w;
        }
        self.arms.len() - 1
    }

    fn propose(&mut self, arm: usize) -> Vec<f64> {
        let dim = self.arms[arm].dim();
        if let Some(point) = self.arms[arm].opposite.take() {
            return point;
        }
        let Some(best) = self.arms[arm].best_point.clone() else {
            return (0..dim).map(|_| self.rng.gen::<f64>()).collect();
        };

        let mut direction: Vec<f64> = (0..dim).map(|_| self.rng.gen::<f64>() * 2.0 - 1.0).collect();
        let norm = direction.iter().map(|v| v * v).sum::<f64>().sqrt().max(1e-12);
        direction.iter_mut().for_each(|v| *v /= norm);

        let step = self.arms[arm].step;
        let forward: Vec<f64> = best
            .iter()
            .zip(&direction)
            .map(|(b, d)| (b + step * d).clamp(0.0, 1.0))
            .collect();
        let backward: Vec<f64> = best
            .iter()
            .zip(&direction)
            .map(|(b, d)| (b - step * d).clamp(0.0, 1.0))
            .collect();
        self.arms[arm].opposite = Some(backward);
        forward
    }
}

impl Tuner for EciCostFrugalTuner {
    fn suggest(&mut self) -> TrialParams {
        if let Some(arm) = self.arms.iter().position(|a| !a.started) {
            self.arms[arm].started = true;
            debug!(arm = ?self.arms[arm].choice, "Trying arm at low-cost defaults");
            return self.materialize(arm, None);
        }

        let arm = self.choose_arm();
        let point = self.propose(arm);
        self.materialize(arm, Some(&point))
    }

    fn observe(&mut self, params: &TrialParams, loss: f64, cost_secs: f64) {
        let Some(arm) = self.arm_index(params) else {
            return;
        };
        let point = self.to_point(arm, params);
        let dim = self.arms[arm].dim().max(1);

        if loss < self.best_loss {
            self.best_loss = loss;
        }

        let state = &mut self.arms[arm];
        state.n_observed += 1;
        state.total_cost += cost_secs.max(0.0);

        if loss < state.best_loss {
            state.best_loss = loss;
            state.best_point = Some(point);
            state.stalls = 0;
            state.opposite = None;
        } else {
            state.stalls += 1;
            if state.stalls >= 2 * dim {
                state.step *= 0.5;
                state.stalls = 0;
                if state.step < MIN_STEP {
                    state.step = INITIAL_STEP;
                }
                debug!(arm = ?state.choice, step = state.step, "Local search step adjusted");
            }
        }
    }

    fn strategy(&self) -> TunerStrategy {
        TunerStrategy::EciCostFrugal
    }
}

/// First unconditional categorical parameter that gates other parameters
fn find_arm_parameter(space: &SearchSpace) -> Option<&Parameter> {
    space.parameters().iter().find(|p| {
        p.condition.is_none()
            && matches!(p.param_type, ParameterType::Categorical { .. })
            && space
                .parameters()
                .iter()
                .any(|q| q.condition.as_ref().map_or(false, |c| c.parent == p.name))
    })
}
