//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float {
        low: f64,
        high: f64,
        log_scale: bool,
    },
    /// Integer parameter
    Int {
        low: i64,
        high: i64,
        log_scale: bool,
    },
    /// Categorical parameter
    Categorical {
        choices: Vec<String>,
    },
    /// Boolean parameter
    Boolean,
}

/// Parameter only active when `parent` was sampled as `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamCondition {
    pub parent: String,
    pub value: String,
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
    /// Low-cost starting value
    pub default: Option<ParameterValue>,
    pub condition: Option<ParamCondition>,
}

impl Parameter {
    fn with_type(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            condition: None,
        }
    }

    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self::with_type(name, ParameterType::Float { low, high, log_scale: false })
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self::with_type(name, ParameterType::Float { low, high, log_scale: true })
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self::with_type(name, ParameterType::Int { low, high, log_scale: false })
    }

    /// Create a log-scale integer parameter
    pub fn log_int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self::with_type(name, ParameterType::Int { low, high, log_scale: true })
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: Vec<&str>) -> Self {
        Self::with_type(
            name,
            ParameterType::Categorical {
                choices: choices.into_iter().map(String::from).collect(),
            },
        )
    }

    /// Create a boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::with_type(name, ParameterType::Boolean)
    }

    pub fn with_default(mut self, value: ParameterValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_condition(mut self, parent: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition = Some(ParamCondition {
            parent: parent.into(),
            value: value.into(),
        });
        self
    }

    /// Whether the parameter applies given the values sampled so far
    pub fn is_active(&self, params: &TrialParams) -> bool {
        match &self.condition {
            None => true,
            Some(cond) => params
                .get(&cond.parent)
                .and_then(|v| v.as_string())
                .map_or(false, |v| v == cond.value),
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        self.from_unit(rng.gen::<f64>())
    }

    /// Configured default, or the low end of the range
    pub fn default_value(&self) -> ParameterValue {
        if let Some(v) = &self.default {
            return v.clone();
        }
        match &self.param_type {
            ParameterType::Float { low, .. } => ParameterValue::Float(*low),
            ParameterType::Int { low, .. } => ParameterValue::Int(*low),
            ParameterType::Categorical { choices } => {
                ParameterValue::String(choices.first().cloned().unwrap_or_default())
            }
            ParameterType::Boolean => ParameterValue::Bool(false),
        }
    }

    /// Map a value in `[0, 1]` onto the parameter's domain
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale && *low > 0.0 {
                    let (ll, lh) = (low.ln(), high.ln());
                    (ll + u * (lh - ll)).exp()
                } else {
                    low + u * (high - low)
                };
                ParameterValue::Float(val.clamp(*low, *high))
            }
            ParameterType::Int { low, high, log_scale } => {
                let (lo, hi) = (*low as f64, *high as f64);
                let val = if *log_scale && lo > 0.0 {
                    let (ll, lh) = (lo.ln(), (hi + 1.0).ln());
                    (ll + u * (lh - ll)).exp().floor()
                } else {
                    (lo + u * (hi - lo + 1.0)).floor()
                };
                ParameterValue::Int((val as i64).clamp(*low, *high))
            }
            ParameterType::Categorical { choices } => {
                if choices.is_empty() {
                    return ParameterValue::String(String::new());
                }
                let idx = ((u * choices.len() as f64) as usize).min(choices.len() - 1);
                ParameterValue::String(choices[idx].clone())
            }
            ParameterType::Boolean => ParameterValue::Bool(u >= 0.5),
        }
    }

    /// Inverse of [`Parameter::from_unit`]; values land in the middle of their bucket
    pub fn to_unit(&self, value: &ParameterValue) -> f64 {
        let u = match (&self.param_type, value) {
            (ParameterType::Float { low, high, log_scale }, v) => {
                let x = v.as_float().unwrap_or(*low);
                if high <= low {
                    0.0
                } else if *log_scale && *low > 0.0 {
                    (x.max(*low).ln() - low.ln()) / (high.ln() - low.ln())
                } else {
                    (x - low) / (high - low)
                }
            }
            (ParameterType::Int { low, high, log_scale }, v) => {
                let x = v.as_int().unwrap_or(*low) as f64;
                let (lo, hi) = (*low as f64, *high as f64);
                if *log_scale && lo > 0.0 {
                    let (ll, lh) = (lo.ln(), (hi + 1.0).ln());
                    ((x + 0.5).ln() - ll) / (lh - ll)
                } else {
                    (x - lo + 0.5) / (hi - lo + 1.0)
                }
            }
            (ParameterType::Categorical { choices }, v) => {
                let idx = v
                    .as_string()
                    .and_then(|s| choices.iter().position(|c| c == s))
                    .unwrap_or(0);
                (idx as f64 + 0.5) / choices.len().max(1) as f64
            }
            (ParameterType::Boolean, v) => {
                if v.as_bool().unwrap_or(false) {
                    0.75
                } else {
                    0.25
                }
            }
        };
        u.clamp(0.0, 1.0)
    }

    /// Choices of a categorical parameter
    pub fn choices(&self) -> Option<&[String]> {
        match &self.param_type {
            ParameterType::Categorical { choices } => Some(choices),
            _ => None,
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{:.4}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => f.write_str(v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Sampled configuration, keyed by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Render params as `k=v, k=v` for logs and summaries
pub fn format_params(params: &TrialParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add a log-scale float parameter
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a categorical parameter
    pub fn categorical(self, name: impl Into<String>, choices: Vec<&str>) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    /// Add a boolean parameter
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(Parameter::boolean(name))
    }

    /// Append another space's parameters, renamed `prefix.name` and gated on `condition`
    pub fn extend_prefixed(&mut self, prefix: &str, other: &SearchSpace, condition: Option<&ParamCondition>) {
        for p in &other.parameters {
            let mut p = p.clone();
            p.name = format!("{}.{}", prefix, p.name);
            if p.condition.is_none() {
                p.condition = condition.cloned();
            }
            self.parameters.push(p);
        }
    }

    /// Push a parameter in place
    pub fn push(&mut self, param: Parameter) {
        self.parameters.push(param);
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Sample a random configuration; inactive conditional parameters are left out
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.fill(|p| p.sample(&mut *rng))
    }

    /// Configuration made of every parameter's default
    pub fn defaults(&self) -> TrialParams {
        self.fill(|p| p.default_value())
    }

    /// Build a configuration parameter by parameter, in declaration order
    pub fn fill(&self, mut value_of: impl FnMut(&Parameter) -> ParameterValue) -> TrialParams {
        let mut params = TrialParams::new();
        for p in &self.parameters {
            if p.is_active(&params) {
                params.insert(p.name.clone(), value_of(p));
            }
        }
        params
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// Parameters addressed under `prefix.` with the prefix stripped
pub fn strip_prefix(params: &TrialParams, prefix: &str) -> TrialParams {
    let head = format!("{}.", prefix);
    params
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(&head).map(|rest| (rest.to_string(), v.clone())))
        .collect()
}
