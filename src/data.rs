use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::ColumnType;

/// Rendering used for an absent (null) cell.
pub const NULL_TEXT: &str = "null";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Guid(Uuid),
    Decimal(Decimal),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Guid(g) => g.to_string(),
            Value::Decimal(d) => d.to_string(),
        }
    }

    /// The datatype this value naturally carries.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Date(_) => ColumnType::Date,
            Value::DateTime(_) => ColumnType::DateTime,
            Value::Time(_) => ColumnType::Time,
            Value::Guid(_) => ColumnType::Guid,
            Value::Decimal(_) => ColumnType::Decimal,
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Float(f) => Decimal::from_f64(*f),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

/// Renders an optional cell for diagnostics; nulls become `null`.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.as_display(),
        None => NULL_TEXT.to_string(),
    }
}

/// Orders two values of compatible kinds. Numeric kinds compare across
/// variants; anything else must share a variant.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (Value::Float(a), other) | (other, Value::Float(a)) if other.as_decimal().is_some() => {
            let b = other.as_decimal().and_then(|d| d.to_f64())?;
            let ordering = a.total_cmp(&b);
            if matches!(left, Value::Float(_)) {
                Some(ordering)
            } else {
                Some(ordering.reverse())
            }
        }
        _ => {
            let a = left.as_decimal()?;
            let b = right.as_decimal()?;
            Some(a.cmp(&b))
        }
    }
}

/// Orders optional cells with nulls first.
pub fn compare_optional(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b)
            .unwrap_or_else(|| a.as_display().cmp(&b.as_display())),
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_naive_time(value: &str) -> Result<NaiveTime> {
    const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
    for fmt in TIME_FORMATS {
        if let Ok(parsed) = NaiveTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as time"))
}

fn parse_boolean(value: &str) -> Result<bool> {
    let lowered = value.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => bail!("Failed to parse '{value}' as boolean"),
    }
}

/// Parses raw text into a typed value. Empty text is a null cell; `Unknown`
/// keeps the text as a string.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String | ColumnType::Unknown => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Decimal => {
            let parsed = Decimal::from_str(value.trim())
                .or_else(|_| Decimal::from_scientific(value.trim()))
                .with_context(|| format!("Failed to parse '{value}' as decimal"))?;
            Value::Decimal(parsed)
        }
        ColumnType::Boolean => Value::Boolean(parse_boolean(value)?),
        ColumnType::Date => Value::Date(parse_naive_date(value.trim())?),
        ColumnType::DateTime => Value::DateTime(parse_naive_datetime(value.trim())?),
        ColumnType::Time => Value::Time(parse_naive_time(value.trim())?),
        ColumnType::Guid => {
            let trimmed = value.trim().trim_matches(|c| matches!(c, '{' | '}'));
            let parsed = Uuid::parse_str(trimmed)
                .with_context(|| format!("Failed to parse '{value}' as GUID"))?;
            Value::Guid(parsed)
        }
    };
    Ok(Some(parsed))
}

/// Converts a value into the representation of `ty` so that both sides of a
/// comparison are interpreted the same way.
pub fn cast_value(value: &Value, ty: &ColumnType) -> Result<Value> {
    if ty.is_unknown() || value.column_type() == *ty {
        return Ok(value.clone());
    }
    let cast = match (ty, value) {
        (ColumnType::String, other) => Some(Value::String(other.as_display())),
        (_, Value::String(text)) => parse_typed_value(text, ty)?,
        (ColumnType::Integer, Value::Float(f)) if f.fract() == 0.0 => {
            f.to_i64().map(Value::Integer)
        }
        (ColumnType::Integer, Value::Decimal(d)) if d.fract().is_zero() => {
            d.to_i64().map(Value::Integer)
        }
        (ColumnType::Integer, Value::Boolean(b)) => Some(Value::Integer(i64::from(*b))),
        (ColumnType::Float, other) => other.as_decimal().and_then(|d| d.to_f64()).map(Value::Float),
        (ColumnType::Decimal, other) => other.as_decimal().map(Value::Decimal),
        (ColumnType::Boolean, Value::Integer(0)) => Some(Value::Boolean(false)),
        (ColumnType::Boolean, Value::Integer(1)) => Some(Value::Boolean(true)),
        (ColumnType::Date, Value::DateTime(dt)) => Some(Value::Date(dt.date())),
        (ColumnType::DateTime, Value::Date(d)) => d.and_hms_opt(0, 0, 0).map(Value::DateTime),
        (ColumnType::Time, Value::DateTime(dt)) => Some(Value::Time(dt.time())),
        _ => None,
    };
    cast.ok_or_else(|| anyhow!("Cannot interpret '{value}' as {ty}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
    }

    #[test]
    fn parse_typed_value_handles_empty_and_boolean_inputs() {
        assert_eq!(parse_typed_value("", &ColumnType::Integer).unwrap(), None);
        assert_eq!(
            parse_typed_value("Yes", &ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert!(parse_typed_value("maybe", &ColumnType::Boolean).is_err());
    }

    #[test]
    fn cast_value_parses_strings_into_target_type() {
        let cast = cast_value(&Value::from("42"), &ColumnType::Integer).unwrap();
        assert_eq!(cast, Value::Integer(42));
        let cast = cast_value(&Value::Integer(3), &ColumnType::Decimal).unwrap();
        assert_eq!(cast, Value::Decimal(Decimal::from(3)));
        assert!(cast_value(&Value::from("abc"), &ColumnType::Integer).is_err());
    }

    #[test]
    fn cast_value_keeps_values_for_unknown_type() {
        let value = Value::from("x");
        assert_eq!(cast_value(&value, &ColumnType::Unknown).unwrap(), value);
    }

    #[test]
    fn compare_values_orders_across_numeric_variants() {
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::Float(2.5), &Value::Integer(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&Value::Decimal(Decimal::from(7)), &Value::Integer(7)),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_values(&Value::from("a"), &Value::Integer(1)), None);
    }

    #[test]
    fn render_value_uses_null_for_absent_cells() {
        assert_eq!(render_value(None), "null");
        assert_eq!(render_value(Some(&Value::Float(3.0))), "3");
    }
}
