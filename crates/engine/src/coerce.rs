//! Conversion from authored JSON payloads into typed field values.
//!
//! Templates and workflow rules carry loosely typed [`serde_json::Value`]
//! payloads. This module converts them into [`FieldValue`] variants using the
//! field's declared type, so merge and evaluation logic can match
//! exhaustively. Values that do not fit the declared type coerce to
//! [`FieldValue::Empty`] rather than erroring.

use indexmap::IndexSet;
use intake_registry::FieldType;
use intake_types::FieldValue;
use intake_util::{
    date_handling::{parse_date_value, parse_datetime_value, truncate_to_minute},
    split_tag_list,
};
use serde_json::Value as JsonValue;

/// Converts an authored JSON payload into the typed value for a field.
pub fn coerce_field_value(field_type: FieldType, raw: &JsonValue) -> FieldValue {
    match field_type {
        FieldType::Text | FieldType::Freeform => match scalar_text(raw) {
            Some(text) if !text.is_empty() => FieldValue::Text(text),
            _ => FieldValue::Empty,
        },
        FieldType::Select | FieldType::TreeSelect => match scalar_text(raw) {
            Some(id) if !id.is_empty() => FieldValue::Id(id),
            _ => FieldValue::Empty,
        },
        FieldType::MultiTreeSelect => {
            let ids = string_list(raw);
            if ids.is_empty() { FieldValue::Empty } else { FieldValue::Ids(ids) }
        }
        FieldType::TagList => {
            let tags: IndexSet<String> = string_list(raw).into_iter().collect();
            FieldValue::Tags(tags)
        }
        FieldType::Date => match raw.as_str().and_then(parse_date_value) {
            Some(date) => FieldValue::Date(date),
            None => FieldValue::Empty,
        },
        FieldType::Datetime => match raw.as_str().and_then(parse_datetime_value) {
            Some(moment) => FieldValue::DateTime(truncate_to_minute(moment)),
            None => FieldValue::Empty,
        },
    }
}

fn scalar_text(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(text) => Some(text.trim().to_string()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn string_list(raw: &JsonValue) -> Vec<String> {
    match raw {
        JsonValue::Array(entries) => entries
            .iter()
            .filter_map(scalar_text)
            .filter(|entry| !entry.is_empty())
            .collect(),
        JsonValue::String(text) => split_tag_list(text),
        JsonValue::Number(number) => vec![number.to_string()],
        _ => Vec::new(),
    }
}
