//! Typed records and their field-descriptor tables.
//!
//! A record type implements [`Record`] once: [`Record::schema`] lists its fields, while
//! [`Record::set_field`] and [`Record::to_row`] move [`Value`]s in and out of the struct. The
//! parser and loader work only through this trait, keyed on each field's
//! [`crate::types::DataType`].
//!
//! ```rust
//! use folder_ingest::record::Record;
//! use folder_ingest::types::{DataType, Field, Schema, Value};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     id: i64,
//!     full_name: Option<String>,
//!     is_active: bool,
//! }
//!
//! impl Record for Person {
//!     fn schema() -> Schema {
//!         Schema::new(vec![
//!             Field::new("id", DataType::Int64),
//!             Field::new("full_name", DataType::Utf8).nullable(),
//!             Field::new("is_active", DataType::Bool),
//!         ])
//!     }
//!
//!     fn set_field(&mut self, name: &str, value: Value) {
//!         match name {
//!             "id" => value.assign_to(&mut self.id),
//!             "full_name" => value.assign_to(&mut self.full_name),
//!             "is_active" => value.assign_to(&mut self.is_active),
//!             _ => {}
//!         }
//!     }
//!
//!     fn to_row(&self) -> Vec<Value> {
//!         vec![self.id.into(), self.full_name.clone().into(), self.is_active.into()]
//!     }
//! }
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{DataSet, Schema, Value};

/// A plain value type that can be populated from delimited rows and written as a table row.
///
/// `Default` supplies the zero value every field starts from; fields without a matching header
/// column keep it.
pub trait Record: Default {
    /// The field-descriptor table for this type.
    ///
    /// Field order defines column order in [`Record::to_row`].
    fn schema() -> Schema;

    /// Store a coerced value into the field called `name`.
    fn set_field(&mut self, name: &str, value: Value);

    /// This record's values, in [`Record::schema`] order. Absent values are [`Value::Null`].
    fn to_row(&self) -> Vec<Value>;
}

/// Conversion from a coerced [`Value`] into a concrete Rust field type.
///
/// Returns `None` when the value does not fit the type; [`Value::assign_to`] then leaves the
/// field untouched.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int64(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float64(v) => Some(v),
            Value::Int64(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Utf8(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Date(v) => Some(v),
            Value::DateTime(v) => Some(v.date()),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::DateTime(v) => Some(v),
            Value::Date(v) => Some(v.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl Value {
    /// Convert `self` into the slot's type and store it; leaves the slot unchanged on mismatch.
    pub fn assign_to<T: FromValue>(self, slot: &mut T) {
        if let Some(v) = T::from_value(self) {
            *slot = v;
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_owned())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Convert a field name such as `FullName` or `httpCode` into `full_name` / `http_code`.
///
/// Names that are already snake case are returned unchanged.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.push(c);
            continue;
        }
        if i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // Acronym boundary: "HTTPCode" -> "http_code".
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Convert a slice of records into tabular form.
///
/// One column per schema field (named by [`crate::types::Field::column_name`]), one row per
/// record.
pub fn to_data_set<T: Record>(records: &[T]) -> DataSet {
    let rows = records.iter().map(Record::to_row).collect();
    DataSet::new(T::schema(), rows)
}
