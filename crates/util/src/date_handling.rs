//! # Date Handling Utilities
//!
//! Parsing and arithmetic helpers for template-authored date and datetime
//! values. Parsing accepts RFC3339 timestamps plus the common ISO forms that
//! authoring UIs emit; arithmetic provides calendar-aware month addition so
//! relative offsets match calendar expectations instead of fixed day counts.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Parses a datetime string in RFC3339 or common ISO formats.
///
/// Naive timestamps (no offset) are interpreted as UTC. A bare date parses
/// to midnight UTC.
///
/// # Example
/// ```rust
/// use intake_util::date_handling::parse_datetime_value;
///
/// assert!(parse_datetime_value("2024-03-01T10:30:00Z").is_some());
/// assert!(parse_datetime_value("2024-03-01 10:30:00").is_some());
/// assert!(parse_datetime_value("2024-03-01").is_some());
/// assert!(parse_datetime_value("not a date").is_none());
/// ```
pub fn parse_datetime_value(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(moment) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(moment.with_timezone(&Utc));
    }

    let naive_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
    for format_string in naive_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format_string) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    parse_date_value(trimmed).and_then(|date| date.and_hms_opt(0, 0, 0)).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parses a date string, accepting bare ISO dates and full timestamps.
///
/// # Example
/// ```rust
/// use intake_util::date_handling::parse_date_value;
/// use chrono::NaiveDate;
///
/// assert_eq!(parse_date_value("2024-03-01"), NaiveDate::from_ymd_opt(2024, 3, 1));
/// assert_eq!(parse_date_value("2024/03/01"), NaiveDate::from_ymd_opt(2024, 3, 1));
/// assert_eq!(parse_date_value("2024-03-01T10:30:00Z"), NaiveDate::from_ymd_opt(2024, 3, 1));
/// ```
pub fn parse_date_value(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%Y/%m/%d"];
    for format_string in formats {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format_string) {
            return Some(date);
        }
    }

    if let Ok(moment) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(moment.with_timezone(&Utc).date_naive());
    }

    None
}

/// Truncates a datetime to minute granularity, zeroing seconds and below.
pub fn truncate_to_minute(moment: DateTime<Utc>) -> DateTime<Utc> {
    moment
        .with_second(0)
        .and_then(|truncated| truncated.with_nanosecond(0))
        .unwrap_or(moment)
}

/// Adds a signed number of calendar months to a datetime.
///
/// Day-of-month is clamped to the target month's length, matching calendar
/// arithmetic rather than a fixed multiple of days.
///
/// # Example
/// ```rust
/// use intake_util::date_handling::{add_calendar_months, parse_datetime_value};
///
/// let january_31 = parse_datetime_value("2024-01-31T00:00:00Z").unwrap();
/// let shifted = add_calendar_months(january_31, 1).unwrap();
/// assert_eq!(shifted.to_rfc3339(), "2024-02-29T00:00:00+00:00");
/// ```
pub fn add_calendar_months(moment: DateTime<Utc>, count: i32) -> Option<DateTime<Utc>> {
    if count >= 0 {
        moment.checked_add_months(Months::new(count as u32))
    } else {
        moment.checked_sub_months(Months::new(count.unsigned_abs()))
    }
}

/// Adds a signed number of calendar months to a bare date, clamping the
/// day-of-month the same way [`add_calendar_months`] does.
pub fn add_calendar_months_date(date: NaiveDate, count: i32) -> Option<NaiveDate> {
    if count >= 0 {
        date.checked_add_months(Months::new(count as u32))
    } else {
        date.checked_sub_months(Months::new(count.unsigned_abs()))
    }
}
