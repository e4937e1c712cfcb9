//! Column roles and manual schema overrides

use crate::error::{AutoMlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Role a column plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Label,
    Numeric,
    Categorical,
    Text,
    Ignored,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Label => "label",
            ColumnRole::Numeric => "numeric",
            ColumnRole::Categorical => "categorical",
            ColumnRole::Text => "text",
            ColumnRole::Ignored => "ignored",
        }
    }

    /// Whether the featurizer consumes columns with this role
    pub fn is_feature(&self) -> bool {
        matches!(
            self,
            ColumnRole::Numeric | ColumnRole::Categorical | ColumnRole::Text
        )
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnRole {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "label" => Ok(ColumnRole::Label),
            "numeric" | "number" => Ok(ColumnRole::Numeric),
            "categorical" | "category" => Ok(ColumnRole::Categorical),
            "text" => Ok(ColumnRole::Text),
            "ignored" | "ignore" | "drop" => Ok(ColumnRole::Ignored),
            other => Err(AutoMlError::InvalidParameter {
                name: "role".to_string(),
                value: other.to_string(),
                reason: "expected one of label, numeric, categorical, text, ignored".to_string(),
            }),
        }
    }
}

/// Mapping from column name to role, in header order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoleSet {
    order: Vec<String>,
    roles: HashMap<String, ColumnRole>,
}

impl ColumnRoleSet {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            roles: HashMap::new(),
        }
    }

    /// Insert or replace a column's role; new columns keep insertion order
    pub fn insert(&mut self, name: impl Into<String>, role: ColumnRole) {
        let name = name.into();
        if self.roles.insert(name.clone(), role).is_none() {
            self.order.push(name);
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, role: ColumnRole) -> Self {
        self.insert(name, role);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn role_of(&self, name: &str) -> Option<ColumnRole> {
        self.roles.get(name).copied()
    }

    /// All column names in header order
    pub fn column_names(&self) -> &[String] {
        &self.order
    }

    /// Columns carrying the given role, in header order
    pub fn columns_with(&self, role: ColumnRole) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.roles.get(name.as_str()) == Some(&role))
            .map(|s| s.as_str())
            .collect()
    }

    /// The designated label column, if any
    pub fn label_column(&self) -> Option<&str> {
        self.columns_with(ColumnRole::Label).into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Apply reclassification rules in order.
    ///
    /// A rule naming a column that is not in the set is skipped, not an error:
    /// inference may drift between dataset revisions.
    pub fn apply_overrides(&mut self, rules: &[ReclassificationRule]) -> OverrideReport {
        let mut report = OverrideReport::default();

        for rule in rules {
            match self.roles.get_mut(&rule.column) {
                Some(role) => {
                    let from = *role;
                    *role = rule.target;
                    debug!(column = %rule.column, %from, to = %rule.target, "Column reclassified");
                    report.applied.push(AppliedOverride {
                        column: rule.column.clone(),
                        from,
                        to: rule.target,
                    });
                }
                None => {
                    debug!(column = %rule.column, "Override skipped: unknown column");
                    report.skipped.push(rule.column.clone());
                }
            }
        }

        report
    }
}

impl Default for ColumnRoleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Move one column into a target role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclassificationRule {
    pub column: String,
    pub target: ColumnRole,
}

impl ReclassificationRule {
    pub fn new(column: impl Into<String>, target: ColumnRole) -> Self {
        Self {
            column: column.into(),
            target,
        }
    }

    /// Rules for the passenger dataset: the id is not a feature and the
    /// integer-coded class tier is a category, not a quantity.
    pub fn passenger_defaults() -> Vec<Self> {
        vec![
            Self::new("PassengerId", ColumnRole::Ignored),
            Self::new("Pclass", ColumnRole::Categorical),
        ]
    }
}

impl FromStr for ReclassificationRule {
    type Err = AutoMlError;

    /// Parse `Column=role`
    fn from_str(s: &str) -> Result<Self> {
        let (column, role) = s.split_once('=').ok_or_else(|| AutoMlError::InvalidParameter {
            name: "override".to_string(),
            value: s.to_string(),
            reason: "expected COLUMN=ROLE".to_string(),
        })?;
        let column = column.trim();
        if column.is_empty() {
            return Err(AutoMlError::InvalidParameter {
                name: "override".to_string(),
                value: s.to_string(),
                reason: "column name is empty".to_string(),
            });
        }
        Ok(Self::new(column, role.parse()?))
    }
}

/// One applied reclassification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub column: String,
    pub from: ColumnRole,
    pub to: ColumnRole,
}

/// Outcome of applying a rule list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideReport {
    pub applied: Vec<AppliedOverride>,
    pub skipped: Vec<String>,
}
