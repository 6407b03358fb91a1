//! Condition evaluation against live field values.

use intake_types::{Condition, ConditionOperator, FieldValue};
use serde_json::Value as JsonValue;

/// Evaluates a single rule condition against the current field value.
///
/// Comparison semantics by operator:
/// - `Is`: the field's element(s) intersect the expected value(s); an empty
///   expected payload matches an empty field.
/// - `Contains`: substring match for text fields, element presence for
///   multi-valued fields.
/// - `OneOf`: membership of the field value in the expected list.
/// - `GreaterThan`/`LessThan`: numeric comparison; non-numeric values never
///   match.
pub fn condition_matches(condition: &Condition, value: &FieldValue) -> bool {
    match condition.operator {
        ConditionOperator::Is => matches_is(&condition.value, value),
        ConditionOperator::IsNot => !matches_is(&condition.value, value),
        ConditionOperator::Contains => matches_contains(&condition.value, value),
        ConditionOperator::ContainsNot => !matches_contains(&condition.value, value),
        ConditionOperator::OneOf => matches_is(&condition.value, value),
        ConditionOperator::GreaterThan => compare_numeric(value, &condition.value).map(|ordering| ordering.is_gt()).unwrap_or(false),
        ConditionOperator::LessThan => compare_numeric(value, &condition.value).map(|ordering| ordering.is_lt()).unwrap_or(false),
    }
}

fn matches_is(expected: &JsonValue, value: &FieldValue) -> bool {
    let expected_values = expected_texts(expected);
    let actual_values = actual_elements(value);
    if expected_values.is_empty() {
        return actual_values.is_empty();
    }
    expected_values.iter().any(|candidate| actual_values.contains(candidate))
}

fn matches_contains(expected: &JsonValue, value: &FieldValue) -> bool {
    let expected_values = expected_texts(expected);
    if expected_values.is_empty() {
        return false;
    }

    match value {
        FieldValue::Text(text) => expected_values.iter().any(|needle| text.contains(needle)),
        _ => {
            let actual_values = actual_elements(value);
            expected_values.iter().any(|candidate| actual_values.contains(candidate))
        }
    }
}

fn compare_numeric(value: &FieldValue, expected: &JsonValue) -> Option<std::cmp::Ordering> {
    let actual = value.as_comparable_text()?.trim().parse::<f64>().ok()?;
    let threshold = match expected {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    actual.partial_cmp(&threshold)
}

fn expected_texts(expected: &JsonValue) -> Vec<String> {
    match expected {
        JsonValue::String(text) if !text.trim().is_empty() => vec![text.trim().to_string()],
        JsonValue::Number(number) => vec![number.to_string()],
        JsonValue::Bool(flag) => vec![flag.to_string()],
        JsonValue::Array(entries) => entries.iter().flat_map(expected_texts).collect(),
        _ => Vec::new(),
    }
}

fn actual_elements(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::Tags(tags) => tags.iter().cloned().collect(),
        FieldValue::Ids(ids) => ids.clone(),
        other => other.as_comparable_text().into_iter().filter(|text| !text.trim().is_empty()).collect(),
    }
}
