use googletest::prelude::*;
use serde_json::json;

use super::*;
use crate::descriptor::{Group, InputId};

fn number_input(id: &str) -> Input {
    Input {
        id: InputId::test_id(id),
        name: None,
        description: None,
        type_tag: InputTypeTag::Number,
        integer: false,
        optional: false,
        default_value: None,
        value_key: None,
        command_line_flag: None,
        command_line_flag_separator: None,
        list: false,
        list_separator: None,
        min_list_entries: None,
        max_list_entries: None,
        minimum: None,
        maximum: None,
        value_choices: None,
        file_must_exist: false,
    }
}

fn group(id: &str, members: &[&str]) -> Group {
    Group {
        id: InputId::test_id(id),
        name: None,
        description: None,
        members: members.iter().map(|m| InputId::test_id(m)).collect(),
        mutually_exclusive: false,
        all_required: false,
        one_is_required: false,
    }
}

#[gtest]
fn test_resolves_float_range() {
    let mut input = number_input("threshold");
    input.minimum = Some(0.0);
    input.maximum = Some(1.0);

    let resolved = resolve_input(&input).expect("expected resolvable constraints");
    expect_that!(
        resolved.set.range,
        some(eq(&NumericRange::Float {
            min: Some(0.0),
            max: Some(1.0),
        }))
    );
    expect_that!(resolved.set.check_count(), eq(2));
}

#[gtest]
fn test_resolves_integer_range_to_integer_subtype() {
    let mut input = number_input("count");
    input.integer = true;
    input.minimum = Some(1.0);

    let resolved = resolve_input(&input).expect("expected resolvable constraints");
    expect_that!(
        resolved.set.range,
        some(eq(&NumericRange::Int {
            min: Some(1),
            max: None,
        }))
    );
    expect_that!(resolved.set.check_count(), eq(1));
}

#[gtest]
fn test_rejects_inverted_range() {
    let mut input = number_input("threshold");
    input.minimum = Some(2.0);
    input.maximum = Some(1.0);

    expect_that!(
        resolve_input(&input),
        err(matches_pattern!(ConstraintError::RangeInverted {
            min: eq(&2.0),
            max: eq(&1.0),
            ..
        }))
    );
}

#[gtest]
fn test_rejects_non_integral_bound_on_integer_input() {
    let mut input = number_input("count");
    input.integer = true;
    input.maximum = Some(2.5);

    expect_that!(
        resolve_input(&input),
        err(matches_pattern!(ConstraintError::NonIntegralBound {
            value: eq(&2.5),
            ..
        }))
    );
}

#[gtest]
fn test_rejects_inverted_and_negative_list_bounds() {
    let mut input = number_input("values");
    input.list = true;
    input.min_list_entries = Some(3);
    input.max_list_entries = Some(1);
    expect_that!(
        resolve_input(&input),
        err(matches_pattern!(ConstraintError::ListBoundsInverted {
            min: eq(&3),
            max: eq(&1),
            ..
        }))
    );

    let mut input = number_input("values");
    input.list = true;
    input.min_list_entries = Some(-1);
    expect_that!(
        resolve_input(&input),
        err(matches_pattern!(ConstraintError::NegativeListBound {
            value: eq(&-1),
            ..
        }))
    );
}

#[gtest]
fn test_deduplicates_choices_preserving_order() {
    let mut input = number_input("mode");
    input.type_tag = InputTypeTag::String;
    input.value_choices = Some(vec![json!("b"), json!("a"), json!("b"), json!("c")]);

    let resolved = resolve_input(&input).expect("expected resolvable constraints");
    expect_that!(
        resolved.choices,
        some(eq(&vec![
            ChoiceValue::Str("b".to_string()),
            ChoiceValue::Str("a".to_string()),
            ChoiceValue::Str("c".to_string()),
        ]))
    );
}

#[gtest]
fn test_rejects_mistyped_choice() {
    let mut input = number_input("level");
    input.integer = true;
    input.value_choices = Some(vec![json!(1), json!("two")]);

    expect_that!(
        resolve_input(&input),
        err(matches_pattern!(ConstraintError::ChoiceTypeMismatch { .. }))
    );
}

#[gtest]
fn test_allows_exclusive_one_required_group() {
    let mut g = group("pick", &["a", "b"]);
    g.mutually_exclusive = true;
    g.one_is_required = true;

    let rule = resolve_group(&g).expect("expected resolvable group");
    expect_that!(rule.check_count(), eq(2));
}

#[gtest]
fn test_rejects_exclusive_all_required_group_with_many_members() {
    let mut g = group("bad", &["a", "b"]);
    g.mutually_exclusive = true;
    g.all_required = true;

    expect_that!(
        resolve_group(&g),
        err(matches_pattern!(ConstraintError::ContradictoryGroup {
            members: eq(&2),
            ..
        }))
    );
}

#[gtest]
fn test_allows_exclusive_all_required_singleton_group() {
    let mut g = group("single", &["a"]);
    g.mutually_exclusive = true;
    g.all_required = true;

    expect_that!(resolve_group(&g), ok(anything()));
}
