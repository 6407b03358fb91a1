//! Date value resolution for template options.
//!
//! Converts a template's static or relative date specification into a
//! concrete value at apply time. Relative month and year offsets use
//! calendar arithmetic (day-of-month clamped), matching what downstream
//! consumers compare the result against. Malformed specifications resolve to
//! `None`, which clears the field.

use chrono::{DateTime, Duration, Utc};
use intake_registry::FieldType;
use intake_types::{FieldValue, TemplateFieldOption, TemplateOperator, TimeRange};
use intake_util::date_handling::{add_calendar_months, parse_date_value, parse_datetime_value, truncate_to_minute};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Resolves a template date/datetime option into a concrete value.
///
/// Returns `None` when the option's value is absent, unparseable, or a
/// relative option is missing its range unit. Datetime results are truncated
/// to minute granularity; date results carry no time component.
pub fn resolve_date_option(option: &TemplateFieldOption, now: DateTime<Utc>, field_type: FieldType) -> Option<FieldValue> {
    if !field_type.is_temporal() {
        return None;
    }

    match option.operator {
        Some(TemplateOperator::Relative) => resolve_relative(option, now, field_type),
        _ => resolve_static(option, field_type),
    }
}

fn resolve_static(option: &TemplateFieldOption, field_type: FieldType) -> Option<FieldValue> {
    let raw = option.value.as_str()?;
    match field_type {
        FieldType::Date => parse_date_value(raw).map(FieldValue::Date),
        _ => parse_datetime_value(raw).map(|moment| FieldValue::DateTime(truncate_to_minute(moment))),
    }
}

fn resolve_relative(option: &TemplateFieldOption, now: DateTime<Utc>, field_type: FieldType) -> Option<FieldValue> {
    let count = relative_count(&option.value)?;
    let Some(range) = option.range else {
        debug!(count, "relative date option without range unit, clearing field");
        return None;
    };

    let shifted = match range {
        TimeRange::Minute => now.checked_add_signed(Duration::minutes(count)),
        TimeRange::Hour => now.checked_add_signed(Duration::hours(count)),
        TimeRange::Day => now.checked_add_signed(Duration::days(count)),
        TimeRange::Week => now.checked_add_signed(Duration::weeks(count)),
        TimeRange::Month => add_calendar_months(now, i32::try_from(count).ok()?),
        TimeRange::Year => add_calendar_months(now, i32::try_from(count).ok()?.checked_mul(12)?),
    }?;

    match field_type {
        FieldType::Date => Some(FieldValue::Date(shifted.date_naive())),
        _ => Some(FieldValue::DateTime(truncate_to_minute(shifted))),
    }
}

fn relative_count(raw: &JsonValue) -> Option<i64> {
    match raw {
        JsonValue::Number(number) => number.as_i64(),
        JsonValue::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn option(value: JsonValue, operator: Option<TemplateOperator>, range: Option<TimeRange>) -> TemplateFieldOption {
        TemplateFieldOption {
            value,
            operator,
            range,
            value_completion: None,
        }
    }

    fn now() -> DateTime<Utc> {
        parse_datetime_value("2024-01-31T00:00:00Z").expect("fixed now")
    }

    #[test]
    fn static_datetime_truncates_to_minute() {
        let resolved = resolve_date_option(
            &option(json!("2024-03-01T10:30:45Z"), Some(TemplateOperator::Static), None),
            now(),
            FieldType::Datetime,
        );
        assert_eq!(
            resolved,
            Some(FieldValue::DateTime(parse_datetime_value("2024-03-01T10:30:00Z").expect("expected")))
        );
    }

    #[test]
    fn missing_operator_parses_as_static() {
        let resolved = resolve_date_option(&option(json!("2024-03-05"), None, None), now(), FieldType::Date);
        assert_eq!(resolved, Some(FieldValue::Date(parse_date_value("2024-03-05").expect("date"))));
    }

    #[test]
    fn relative_month_follows_calendar_arithmetic() {
        let resolved = resolve_date_option(
            &option(json!(1), Some(TemplateOperator::Relative), Some(TimeRange::Month)),
            now(),
            FieldType::Datetime,
        );
        // 2024-01-31 plus one calendar month clamps to the leap-year February 29.
        assert_eq!(
            resolved,
            Some(FieldValue::DateTime(parse_datetime_value("2024-02-29T00:00:00Z").expect("expected")))
        );
    }

    #[test]
    fn relative_year_advances_the_year_field() {
        let resolved = resolve_date_option(
            &option(json!("2"), Some(TemplateOperator::Relative), Some(TimeRange::Year)),
            now(),
            FieldType::Date,
        );
        assert_eq!(resolved, Some(FieldValue::Date(parse_date_value("2026-01-31").expect("date"))));
    }

    #[test]
    fn relative_minutes_and_weeks_use_fixed_offsets() {
        let minutes = resolve_date_option(
            &option(json!(90), Some(TemplateOperator::Relative), Some(TimeRange::Minute)),
            now(),
            FieldType::Datetime,
        );
        assert_eq!(
            minutes,
            Some(FieldValue::DateTime(parse_datetime_value("2024-01-31T01:30:00Z").expect("expected")))
        );

        let weeks = resolve_date_option(
            &option(json!(2), Some(TemplateOperator::Relative), Some(TimeRange::Week)),
            now(),
            FieldType::Date,
        );
        assert_eq!(weeks, Some(FieldValue::Date(parse_date_value("2024-02-14").expect("date"))));
    }

    #[test]
    fn malformed_specs_resolve_to_none() {
        assert_eq!(
            resolve_date_option(&option(json!("soonish"), Some(TemplateOperator::Static), None), now(), FieldType::Date),
            None
        );
        assert_eq!(
            resolve_date_option(&option(json!(1), Some(TemplateOperator::Relative), None), now(), FieldType::Datetime),
            None,
            "relative without range clears the field"
        );
        assert_eq!(resolve_date_option(&option(json!(null), None, None), now(), FieldType::Date), None);
    }
}
