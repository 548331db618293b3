//! Per-field coercion of raw cell text into typed [`Value`]s.
//!
//! Coercion never fails: an empty or unparsable cell falls back to the field's default (see
//! [`default_value`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::types::{DataType, Field, Value};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Coerce one raw cell into a value for `field`.
///
/// Returns `None` when the field must be left at its zero value.
pub fn coerce(field: &Field, raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return default_value(field);
    }

    let parsed = match field.data_type {
        DataType::Date => parse_date(raw).map(Value::Date),
        DataType::DateTime => parse_date_time(raw).map(Value::DateTime),
        // Only the literal "1" is true.
        DataType::Bool => Some(Value::Bool(raw == "1")),
        DataType::Int64 => raw.trim().parse::<i64>().ok().map(Value::Int64),
        DataType::Float64 => raw.trim().parse::<f64>().ok().map(Value::Float64),
        DataType::Utf8 => Some(Value::Utf8(raw.to_owned())),
    };

    parsed.or_else(|| default_value(field))
}

/// The value used when a cell is empty or cannot be converted.
///
/// - nullable fields: [`Value::Null`]
/// - dates: today's UTC date
/// - date-times: the current UTC timestamp
/// - booleans: `true`
/// - anything else: `None` (the field keeps its zero value)
pub fn default_value(field: &Field) -> Option<Value> {
    if field.nullable {
        return Some(Value::Null);
    }
    match field.data_type {
        DataType::Date => Some(Value::Date(Utc::now().date_naive())),
        DataType::DateTime => Some(Value::DateTime(Utc::now().naive_utc())),
        DataType::Bool => Some(Value::Bool(true)),
        DataType::Int64 | DataType::Float64 | DataType::Utf8 => None,
    }
}

/// Parse a date in one of the culture-independent layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a date-time; offsets are normalized to UTC and bare dates become midnight.
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
}
