//! Integration test: column inference followed by manual reclassification

mod common;

use proptest::prelude::*;
use titanic_automl::autopipeline::ColumnInferencer;
use titanic_automl::data::{ColumnRole, ColumnRoleSet, ReclassificationRule};

const COLUMNS: [&str; 6] = ["PassengerId", "Survived", "Pclass", "Name", "Sex", "Fare"];

fn base_roles() -> ColumnRoleSet {
    ColumnRoleSet::new()
        .with("PassengerId", ColumnRole::Numeric)
        .with("Survived", ColumnRole::Label)
        .with("Pclass", ColumnRole::Numeric)
        .with("Name", ColumnRole::Text)
        .with("Sex", ColumnRole::Categorical)
        .with("Fare", ColumnRole::Numeric)
}

fn role_strategy() -> impl Strategy<Value = ColumnRole> {
    prop_oneof![
        Just(ColumnRole::Numeric),
        Just(ColumnRole::Categorical),
        Just(ColumnRole::Text),
        Just(ColumnRole::Ignored),
    ]
}

fn rule_strategy() -> impl Strategy<Value = ReclassificationRule> {
    let known = prop::sample::select(COLUMNS.to_vec()).prop_map(String::from);
    let unknown = "[A-Z][a-z]{2,8}Col".prop_map(String::from);
    (prop_oneof![3 => known, 1 => unknown], role_strategy())
        .prop_map(|(column, role)| ReclassificationRule::new(column, role))
}

proptest! {
    #[test]
    fn prop_overrides_are_idempotent(rules in prop::collection::vec(rule_strategy(), 0..12)) {
        let mut once = base_roles();
        once.apply_overrides(&rules);

        let mut twice = once.clone();
        twice.apply_overrides(&rules);

        prop_assert_eq!(&once, &twice);
        let base = base_roles();
        prop_assert_eq!(once.column_names(), base.column_names());
    }

    #[test]
    fn prop_unknown_columns_never_change_roles(
        names in prop::collection::vec("[a-z]{3,10}_unknown", 1..6),
        role in role_strategy(),
    ) {
        let rules: Vec<ReclassificationRule> =
            names.iter().map(|n| ReclassificationRule::new(n.clone(), role)).collect();
        let mut roles = base_roles();
        let report = roles.apply_overrides(&rules);

        prop_assert_eq!(&roles, &base_roles());
        prop_assert!(report.applied.is_empty());
        prop_assert_eq!(report.skipped.len(), rules.len());
    }
}

#[test]
fn test_passenger_file_roles_after_defaults() {
    let (_dir, path) = common::write_passenger_csv(120);
    let inference = ColumnInferencer::new().infer_columns(&path, "Survived").unwrap();

    let mut roles = inference.column_roles.clone();
    assert_eq!(roles.role_of("Pclass"), Some(ColumnRole::Numeric));

    let report = roles.apply_overrides(&ReclassificationRule::passenger_defaults());
    assert_eq!(report.applied.len(), 2);
    assert_eq!(roles.role_of("PassengerId"), Some(ColumnRole::Ignored));
    assert_eq!(roles.role_of("Pclass"), Some(ColumnRole::Categorical));
    assert_eq!(roles.role_of("Name"), Some(ColumnRole::Text));
    assert_eq!(roles.role_of("Sex"), Some(ColumnRole::Categorical));
    assert_eq!(roles.role_of("Age"), Some(ColumnRole::Numeric));
    assert_eq!(roles.role_of("Embarked"), Some(ColumnRole::Categorical));
    assert_eq!(roles.label_column(), Some("Survived"));
}

#[test]
fn test_rules_from_command_line_strings() {
    let rules: Vec<ReclassificationRule> = ["Fare=categorical", "Cabin=ignored"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let mut roles = base_roles();
    let report = roles.apply_overrides(&rules);

    assert_eq!(roles.role_of("Fare"), Some(ColumnRole::Categorical));
    assert_eq!(report.skipped, vec!["Cabin".to_string()]);
    assert!("Fare".parse::<ReclassificationRule>().is_err());
    assert!("Fare=weight".parse::<ReclassificationRule>().is_err());
}
