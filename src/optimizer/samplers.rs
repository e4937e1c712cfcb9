//! Sampling strategies for hyperparameter optimization

use super::search_space::{ParameterValue, SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Trait for history-driven samplers. `history` holds `(params, loss)`, lower is better.
pub trait Sampler: Send {
    /// Sample the next set of hyperparameters
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TPESampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Good-minus-bad similarity of a candidate
    fn score(&self, space: &SearchSpace, candidate: &TrialParams, good: &[&TrialParams], bad: &[&TrialParams]) -> f64 {
        let l = Self::similarity(space, candidate, good);
        let g = Self::similarity(space, candidate, bad);
        (l + 1e-12) / (g + 1e-12)
    }

    fn similarity(space: &SearchSpace, candidate: &TrialParams, group: &[&TrialParams]) -> f64 {
        if group.is_empty() {
            return 0.0;
        }

        let total: f64 = group
            .iter()
            .map(|other| {
                let mut dist = 0.0;
                let mut count = 0;
                for (key, val) in candidate {
                    if let (Some(other_val), Some(param)) = (other.get(key), space.get(key)) {
                        let d = match (val, other_val) {
                            (ParameterValue::String(a), ParameterValue::String(b)) => {
                                if a == b { 0.0 } else { 1.0 }
                            }
                            (a, b) => param.to_unit(a) - param.to_unit(b),
                        };
                        dist += d * d;
                        count += 1;
                    } else {
                        dist += 1.0;
                        count += 1;
                    }
                }
                let dist = if count > 0 { (dist / count as f64).sqrt() } else { 1.0 };
                1.0 / (1.0 + 10.0 * dist)
            })
            .sum();

        total / group.len() as f64
    }
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        if history.len() < self.n_startup_trials {
            return search_space.sample(&mut self.rng);
        }

        let mut sorted: Vec<_> = history.iter().filter(|(_, loss)| loss.is_finite()).collect();
        if sorted.is_empty() {
            return search_space.sample(&mut self.rng);
        }
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len());
        let good: Vec<&TrialParams> = sorted[..n_good].iter().map(|(p, _)| p).collect();
        let bad: Vec<&TrialParams> = sorted[n_good..].iter().map(|(p, _)| p).collect();

        let mut best_params = search_space.sample(&mut self.rng);
        let mut best_score = self.score(search_space, &best_params, &good, &bad);

        for _ in 1..self.n_candidates {
            let candidate = search_space.sample(&mut self.rng);
            let score = self.score(search_space, &candidate, &good, &bad);
            if score > best_score {
                best_score = score;
                best_params = candidate;
            }
        }

        best_params
    }
}
