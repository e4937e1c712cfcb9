//! Sweepable pipeline definition
//!
//! A pipeline is a tree of estimator steps. `Sequence` chains its children,
//! `OneOf` lets the search pick exactly one branch. The tree flattens into a
//! single [`SearchSpace`]: every `OneOf` contributes a categorical parameter
//! `one_of.<k>` (numbered in pre-order) and every estimator contributes its own
//! parameters as `<estimator>.<param>`, gated on the branch that contains it.

use super::fitted::FittedPipeline;
use crate::data::ColumnRoleSet;
use crate::error::{AutoMlError, Result};
use crate::optimizer::{strip_prefix, ParamCondition, Parameter, ParameterValue, SearchSpace, TrialParams};
use crate::preprocessing::{FeaturizerOptions, ImputeStrategy};
use crate::training::{TrainerConfig, TrainerKind};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What an estimator step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Featurizer,
    Trainer(TrainerKind),
}

/// One step with its own search space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSpec {
    pub name: String,
    pub kind: EstimatorKind,
    pub space: SearchSpace,
}

impl EstimatorSpec {
    /// Imputation, scaling, one-hot and hashed-text featurization
    pub fn featurizer() -> Self {
        let space = SearchSpace::new()
            .add(Parameter::categorical("impute", vec!["mean", "median"]))
            .add(Parameter::boolean("standardize").with_default(ParameterValue::Bool(true)))
            .add(Parameter::log_int("text_buckets", 8, 256).with_default(ParameterValue::Int(32)));
        Self {
            name: "featurize".to_string(),
            kind: EstimatorKind::Featurizer,
            space,
        }
    }

    pub fn trainer(kind: TrainerKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            kind: EstimatorKind::Trainer(kind),
            space: kind.search_space(),
        }
    }

    /// Replace the search space (an empty space pins the step to its defaults)
    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }
}

/// Pipeline tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineNode {
    Estimator(EstimatorSpec),
    Sequence(Vec<PipelineNode>),
    OneOf(Vec<PipelineNode>),
}

impl PipelineNode {
    pub fn estimator(spec: EstimatorSpec) -> Self {
        PipelineNode::Estimator(spec)
    }

    pub fn sequence(nodes: Vec<PipelineNode>) -> Self {
        PipelineNode::Sequence(nodes)
    }

    pub fn one_of(nodes: Vec<PipelineNode>) -> Self {
        PipelineNode::OneOf(nodes)
    }

    /// Featurizer followed by a choice among `trainers`
    pub fn binary_classification(trainers: &[TrainerKind]) -> Self {
        PipelineNode::sequence(vec![
            PipelineNode::estimator(EstimatorSpec::featurizer()),
            PipelineNode::one_of(
                trainers
                    .iter()
                    .map(|k| PipelineNode::estimator(EstimatorSpec::trainer(*k)))
                    .collect(),
            ),
        ])
    }

    /// Label of a node when it appears as a `OneOf` branch
    fn branch_label(&self, index: usize) -> String {
        match self {
            PipelineNode::Estimator(spec) => spec.name.clone(),
            _ => format!("branch{}", index),
        }
    }

    /// Human readable form, e.g. `featurize > (lightgbm | fast_tree)`
    pub fn describe(&self) -> String {
        match self {
            PipelineNode::Estimator(spec) => spec.name.clone(),
            PipelineNode::Sequence(nodes) => nodes.iter().map(|n| n.describe()).collect::<Vec<_>>().join(" > "),
            PipelineNode::OneOf(nodes) => {
                format!("({})", nodes.iter().map(|n| n.describe()).collect::<Vec<_>>().join(" | "))
            }
        }
    }

    /// Structural checks: non-empty choices, unique estimator names and every
    /// resolvable path ends in exactly one trainer with at most one featurizer
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        self.check_names(&mut names)?;

        for path in self.paths() {
            let trainers = path.iter().filter(|k| matches!(k, EstimatorKind::Trainer(_))).count();
            let featurizers = path.iter().filter(|k| **k == EstimatorKind::Featurizer).count();
            let last_is_trainer = matches!(path.last(), Some(EstimatorKind::Trainer(_)));
            if trainers != 1 || featurizers > 1 || !last_is_trainer {
                return Err(AutoMlError::ConfigurationError(format!(
                    "pipeline '{}' has a path that does not end in exactly one trainer",
                    self.describe()
                )));
            }
        }
        Ok(())
    }

    fn check_names(&self, names: &mut HashSet<String>) -> Result<()> {
        match self {
            PipelineNode::Estimator(spec) => {
                if !names.insert(spec.name.clone()) {
                    return Err(AutoMlError::ConfigurationError(format!(
                        "duplicate estimator '{}' in pipeline",
                        spec.name
                    )));
                }
                Ok(())
            }
            PipelineNode::Sequence(nodes) => nodes.iter().try_for_each(|n| n.check_names(names)),
            PipelineNode::OneOf(nodes) => {
                if nodes.is_empty() {
                    return Err(AutoMlError::ConfigurationError("empty choice in pipeline".to_string()));
                }
                nodes.iter().try_for_each(|n| n.check_names(names))
            }
        }
    }

    /// Every linear path through the tree, as step kinds
    fn paths(&self) -> Vec<Vec<EstimatorKind>> {
        match self {
            PipelineNode::Estimator(spec) => vec![vec![spec.kind]],
            PipelineNode::Sequence(nodes) => nodes.iter().fold(vec![Vec::new()], |acc, node| {
                let tails = node.paths();
                acc.iter()
                    .flat_map(|head| {
                        tails.iter().map(move |tail| {
                            let mut p = head.clone();
                            p.extend(tail.iter().copied());
                            p
                        })
                    })
                    .collect()
            }),
            PipelineNode::OneOf(nodes) => nodes.iter().flat_map(|n| n.paths()).collect(),
        }
    }

    /// Flatten into one namespaced, conditional search space
    pub fn search_space(&self) -> SearchSpace {
        let mut space = SearchSpace::new();
        let mut counter = 0;
        self.collect_space(&mut space, &mut counter, None);
        space
    }

    fn collect_space(&self, space: &mut SearchSpace, counter: &mut usize, condition: Option<&ParamCondition>) {
        match self {
            PipelineNode::Estimator(spec) => space.extend_prefixed(&spec.name, &spec.space, condition),
            PipelineNode::Sequence(nodes) => {
                for n in nodes {
                    n.collect_space(space, counter, condition);
                }
            }
            PipelineNode::OneOf(nodes) => {
                let choice_name = format!("one_of.{}", *counter);
                *counter += 1;
                let labels: Vec<String> = nodes.iter().enumerate().map(|(j, n)| n.branch_label(j)).collect();
                let mut param = Parameter::categorical(choice_name.clone(), labels.iter().map(|s| s.as_str()).collect());
                param.condition = condition.cloned();
                space.push(param);

                for (node, label) in nodes.iter().zip(&labels) {
                    let branch = ParamCondition {
                        parent: choice_name.clone(),
                        value: label.clone(),
                    };
                    node.collect_space(space, counter, Some(&branch));
                }
            }
        }
    }

    /// Pick the branches named in `params` and return the linear plan
    pub fn resolve(&self, params: &TrialParams) -> Result<PipelinePlan> {
        let mut steps = Vec::new();
        let mut counter = 0;
        self.collect_steps(params, &mut counter, true, &mut steps)?;
        Ok(PipelinePlan {
            steps,
            params: params.clone(),
        })
    }

    fn collect_steps(
        &self,
        params: &TrialParams,
        counter: &mut usize,
        active: bool,
        steps: &mut Vec<ResolvedStep>,
    ) -> Result<()> {
        match self {
            PipelineNode::Estimator(spec) => {
                if active {
                    let mut step_params = spec.space.defaults();
                    step_params.extend(strip_prefix(params, &spec.name));
                    steps.push(ResolvedStep {
                        name: spec.name.clone(),
                        kind: spec.kind,
                        params: step_params,
                    });
                }
                Ok(())
            }
            PipelineNode::Sequence(nodes) => nodes
                .iter()
                .try_for_each(|n| n.collect_steps(params, counter, active, steps)),
            PipelineNode::OneOf(nodes) => {
                let choice_name = format!("one_of.{}", *counter);
                *counter += 1;

                let chosen = if active {
                    let value = params.get(&choice_name).and_then(|v| v.as_string());
                    let index = match value {
                        Some(v) => nodes
                            .iter()
                            .enumerate()
                            .position(|(j, n)| n.branch_label(j) == v)
                            .ok_or_else(|| AutoMlError::InvalidParameter {
                                name: choice_name.clone(),
                                value: v.to_string(),
                                reason: "no such branch".to_string(),
                            })?,
                        None => 0,
                    };
                    Some(index)
                } else {
                    None
                };

                for (j, node) in nodes.iter().enumerate() {
                    node.collect_steps(params, counter, chosen == Some(j), steps)?;
                }
                Ok(())
            }
        }
    }
}

/// A step with its parameters resolved (prefix stripped, defaults filled in)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStep {
    pub name: String,
    pub kind: EstimatorKind,
    pub params: TrialParams,
}

/// Linear pipeline chosen for one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub steps: Vec<ResolvedStep>,
    /// The full sampled configuration this plan came from
    pub params: TrialParams,
}

impl PipelinePlan {
    /// e.g. `featurize > lightgbm`
    pub fn describe(&self) -> String {
        self.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(" > ")
    }

    pub fn trainer_kind(&self) -> Option<TrainerKind> {
        self.steps.iter().rev().find_map(|s| match s.kind {
            EstimatorKind::Trainer(k) => Some(k),
            EstimatorKind::Featurizer => None,
        })
    }

    pub fn featurizer_options(&self) -> Result<FeaturizerOptions> {
        let mut options = FeaturizerOptions::default();
        let Some(step) = self.steps.iter().find(|s| s.kind == EstimatorKind::Featurizer) else {
            return Ok(options);
        };
        if let Some(v) = step.params.get("impute").and_then(|v| v.as_string()) {
            options = options.with_impute(v.parse::<ImputeStrategy>()?);
        }
        if let Some(v) = step.params.get("standardize").and_then(|v| v.as_bool()) {
            options = options.with_standardize(v);
        }
        if let Some(v) = step.params.get("text_buckets").and_then(|v| v.as_int()) {
            options = options.with_text_buckets(v.max(1) as usize);
        }
        Ok(options)
    }

    pub fn trainer_config(&self) -> Result<TrainerConfig> {
        self.steps
            .iter()
            .rev()
            .find_map(|s| match s.kind {
                EstimatorKind::Trainer(k) => Some(k.configure(&s.params)),
                EstimatorKind::Featurizer => None,
            })
            .ok_or_else(|| AutoMlError::ConfigurationError(format!("pipeline '{}' has no trainer", self.describe())))
    }

    /// Fit featurizer and trainer on a conformed training frame
    pub fn fit(&self, train: &DataFrame, roles: &ColumnRoleSet, seed: u64) -> Result<FittedPipeline> {
        FittedPipeline::fit(self, train, roles, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> PipelineNode {
        PipelineNode::binary_classification(&TrainerKind::ALL)
    }

    #[test]
    fn test_describe_and_validate() {
        let p = pipeline();
        assert_eq!(p.describe(), "featurize > (lightgbm | fast_tree | logistic_regression)");
        p.validate().unwrap();
    }

    #[test]
    fn test_invalid_pipelines() {
        let no_trainer = PipelineNode::estimator(EstimatorSpec::featurizer());
        assert!(no_trainer.validate().is_err());

        let two_trainers = PipelineNode::sequence(vec![
            PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::LightGbm)),
            PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::FastTree)),
        ]);
        assert!(two_trainers.validate().is_err());

        let duplicate = PipelineNode::one_of(vec![
            PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::LightGbm)),
            PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::LightGbm)),
        ]);
        assert!(duplicate.validate().is_err());

        assert!(PipelineNode::one_of(vec![]).validate().is_err());
    }

    #[test]
    fn test_search_space_is_namespaced_and_gated() {
        let space = pipeline().search_space();
        let choice = space.get("one_of.0").unwrap();
        assert_eq!(choice.choices().unwrap(), ["lightgbm", "fast_tree", "logistic_regression"]);
        assert!(space.get("featurize.impute").unwrap().condition.is_none());

        let leaves = space.get("lightgbm.max_leaves").unwrap();
        assert_eq!(
            leaves.condition,
            Some(ParamCondition { parent: "one_of.0".into(), value: "lightgbm".into() })
        );
    }

    #[test]
    fn test_resolve_picks_branch() {
        let p = pipeline();
        let mut params = p.search_space().defaults();
        params.insert("one_of.0".into(), ParameterValue::String("logistic_regression".into()));
        params.insert("logistic_regression.alpha".into(), ParameterValue::Float(0.5));
        params.insert("featurize.impute".into(), ParameterValue::String("median".into()));

        let plan = p.resolve(&params).unwrap();
        assert_eq!(plan.describe(), "featurize > logistic_regression");
        assert_eq!(plan.trainer_kind(), Some(TrainerKind::LogisticRegression));
        assert_eq!(plan.featurizer_options().unwrap().impute, ImputeStrategy::Median);
        match plan.trainer_config().unwrap() {
            TrainerConfig::LogisticRegression(c) => assert_eq!(c.alpha, 0.5),
            other => panic!("unexpected trainer {:?}", other),
        }
    }

    #[test]
    fn test_resolve_unknown_branch() {
        let mut params = TrialParams::new();
        params.insert("one_of.0".into(), ParameterValue::String("fast_forest".into()));
        assert!(pipeline().resolve(&params).is_err());
    }

    #[test]
    fn test_nested_choice_numbering() {
        let nested = PipelineNode::one_of(vec![
            PipelineNode::sequence(vec![
                PipelineNode::estimator(EstimatorSpec::featurizer()),
                PipelineNode::one_of(vec![
                    PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::LightGbm)),
                    PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::FastTree)),
                ]),
            ]),
            PipelineNode::estimator(EstimatorSpec::trainer(TrainerKind::LogisticRegression)),
        ]);
        nested.validate().unwrap();

        let space = nested.search_space();
        assert!(space.get("one_of.1").is_some());

        let mut params = TrialParams::new();
        params.insert("one_of.0".into(), ParameterValue::String("branch0".into()));
        params.insert("one_of.1".into(), ParameterValue::String("fast_tree".into()));
        assert_eq!(nested.resolve(&params).unwrap().describe(), "featurize > fast_tree");

        params.insert("one_of.0".into(), ParameterValue::String("logistic_regression".into()));
        assert_eq!(nested.resolve(&params).unwrap().describe(), "logistic_regression");
    }
}
