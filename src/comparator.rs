//! Value comparators.
//!
//! A [`ValueComparator`] decides whether an expected and an actual cell are
//! equal under some policy and, when they are not, describes why. Comparators
//! are stateless and shared through [`SharedComparator`] so that the same
//! instance can be registered for many columns and tables.
//!
//! Both cells are first cast to the effective column datatype (see
//! [`cast_value`]) so a string read from an untyped file compares against a
//! typed value from the other side.

use std::{cmp::Ordering, fmt, str::FromStr, sync::Arc};

use anyhow::{Result as AnyResult, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de};

use crate::{
    data::{Value, cast_value, compare_values, render_value},
    schema::ColumnType,
};

pub trait ValueComparator: fmt::Debug + Send + Sync {
    /// Returns `None` when the values match, otherwise a mismatch description.
    fn compare(
        &self,
        datatype: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String>;
}

pub type SharedComparator = Arc<dyn ValueComparator>;

/// The comparator every resolution chain ends in.
pub fn equality() -> SharedComparator {
    Arc::new(Equal)
}

type CastPair = (Option<Value>, Option<Value>);

fn cast_pair(
    datatype: ColumnType,
    expected: Option<&Value>,
    actual: Option<&Value>,
) -> Result<CastPair, String> {
    let cast = |value: Option<&Value>, side: &str| {
        value
            .map(|v| cast_value(v, &datatype))
            .transpose()
            .map_err(|err| format!("{side} value='{}' is invalid: {err}", render_value(value)))
    };
    Ok((cast(expected, "Expected")?, cast(actual, "Actual")?))
}

fn ordering(expected: Option<&Value>, actual: Option<&Value>) -> Option<Ordering> {
    match (actual, expected) {
        (None, None) => Some(Ordering::Equal),
        (None, Some(_)) | (Some(_), None) => None,
        (Some(a), Some(e)) => compare_values(a, e).or_else(|| {
            (a.as_display() == e.as_display()).then_some(Ordering::Equal)
        }),
    }
}

fn describe(actual: Option<&Value>, relation: &str, expected: Option<&Value>) -> String {
    format!(
        "Actual value='{}' {relation} expected value='{}'",
        render_value(actual),
        render_value(expected)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Relation {
    fn holds(&self, ordering: Option<Ordering>) -> bool {
        match self {
            Relation::Equal => ordering == Some(Ordering::Equal),
            Relation::NotEqual => ordering != Some(Ordering::Equal),
            Relation::GreaterThan => ordering == Some(Ordering::Greater),
            Relation::GreaterOrEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            Relation::LessThan => ordering == Some(Ordering::Less),
            Relation::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }

    fn negated_phrase(&self) -> &'static str {
        match self {
            Relation::Equal => "is not equal to",
            Relation::NotEqual => "is equal to",
            Relation::GreaterThan => "is not greater than",
            Relation::GreaterOrEqual => "is not greater than or equal to",
            Relation::LessThan => "is not less than",
            Relation::LessOrEqual => "is not less than or equal to",
        }
    }
}

/// Compares the actual value against the expected value with a fixed relation.
#[derive(Debug, Clone, Copy)]
pub struct RelationComparator(pub Relation);

impl ValueComparator for RelationComparator {
    fn compare(
        &self,
        datatype: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let (expected, actual) = match cast_pair(datatype, expected, actual) {
            Ok(pair) => pair,
            Err(detail) => return Some(detail),
        };
        let ordering = ordering(expected.as_ref(), actual.as_ref());
        if self.0.holds(ordering) {
            None
        } else {
            Some(describe(
                actual.as_ref(),
                self.0.negated_phrase(),
                expected.as_ref(),
            ))
        }
    }
}

/// Built-in equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Equal;

impl ValueComparator for Equal {
    fn compare(
        &self,
        datatype: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        RelationComparator(Relation::Equal).compare(datatype, expected, actual)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ignore;

impl ValueComparator for Ignore {
    fn compare(&self, _: ColumnType, _: Option<&Value>, _: Option<&Value>) -> Option<String> {
        None
    }
}

/// Textual equality after folding case.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl ValueComparator for CaseInsensitive {
    fn compare(
        &self,
        _: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let matches = match (expected, actual) {
            (None, None) => true,
            (Some(e), Some(a)) => e.as_display().to_lowercase() == a.as_display().to_lowercase(),
            _ => false,
        };
        (!matches).then(|| describe(actual, "is not equal (ignoring case) to", expected))
    }
}

/// Textual equality after trimming surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trimmed;

impl ValueComparator for Trimmed {
    fn compare(
        &self,
        _: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let matches = match (expected, actual) {
            (None, None) => true,
            (Some(e), Some(a)) => e.as_display().trim() == a.as_display().trim(),
            _ => false,
        };
        (!matches).then(|| describe(actual, "is not equal (ignoring whitespace) to", expected))
    }
}

/// Numeric equality within an absolute tolerance.
#[derive(Debug, Clone, Copy)]
pub struct NumericTolerance {
    pub tolerance: Decimal,
}

impl ValueComparator for NumericTolerance {
    fn compare(
        &self,
        _: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let (expected, actual) = match (expected, actual) {
            (None, None) => return None,
            (Some(e), Some(a)) => (e, a),
            (e, a) => return Some(describe(a, "is not equal to", e)),
        };
        let as_decimal = |value: &Value| match cast_value(value, &ColumnType::Decimal) {
            Ok(Value::Decimal(d)) => Some(d),
            _ => None,
        };
        let (Some(e), Some(a)) = (as_decimal(expected), as_decimal(actual)) else {
            return Some(describe(Some(actual), "is not numerically comparable to", Some(expected)));
        };
        let within = a
            .checked_sub(e)
            .is_some_and(|delta| delta.abs() <= self.tolerance);
        if within {
            None
        } else {
            Some(describe(
                Some(actual),
                &format!("is not within tolerance {} of", self.tolerance),
                Some(expected),
            ))
        }
    }
}

/// Temporal equality within `[expected - low_ms, expected + high_ms]`.
#[derive(Debug, Clone, Copy)]
pub struct TimestampTolerance {
    pub low_ms: i64,
    pub high_ms: i64,
}

impl TimestampTolerance {
    fn instant(datatype: ColumnType, value: &Value) -> Option<NaiveDateTime> {
        let target = if datatype.is_temporal() {
            datatype
        } else {
            ColumnType::DateTime
        };
        match cast_value(value, &target).ok()? {
            Value::DateTime(dt) => Some(dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Time(t) => Some(NaiveDateTime::new(NaiveDate::default(), t)),
            _ => None,
        }
    }
}

impl ValueComparator for TimestampTolerance {
    fn compare(
        &self,
        datatype: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let (expected, actual) = match (expected, actual) {
            (None, None) => return None,
            (Some(e), Some(a)) => (e, a),
            (e, a) => return Some(describe(a, "is not equal to", e)),
        };
        let (Some(e), Some(a)) = (
            Self::instant(datatype, expected),
            Self::instant(datatype, actual),
        ) else {
            return Some(describe(Some(actual), "is not a timestamp comparable to", Some(expected)));
        };
        let delta = (a - e).num_milliseconds();
        if -self.low_ms <= delta && delta <= self.high_ms {
            None
        } else {
            Some(describe(
                Some(actual),
                &format!(
                    "is not within tolerance range -{} - {} ms of",
                    self.low_ms, self.high_ms
                ),
                Some(expected),
            ))
        }
    }
}

/// Passes when the actual value's text is one of a fixed set.
#[derive(Debug, Clone)]
pub struct OneOf {
    pub values: Vec<String>,
}

impl ValueComparator for OneOf {
    fn compare(
        &self,
        _: ColumnType,
        _expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let text = render_value(actual);
        if self.values.iter().any(|v| *v == text) {
            None
        } else {
            Some(format!(
                "Actual value='{text}' is not one of [{}]",
                self.values.iter().join(", ")
            ))
        }
    }
}

/// Chooses between two comparators based on the expected value's text.
#[derive(Debug, Clone)]
pub struct Conditional {
    pub when: Vec<String>,
    pub then: SharedComparator,
    pub otherwise: SharedComparator,
}

impl ValueComparator for Conditional {
    fn compare(
        &self,
        datatype: ColumnType,
        expected: Option<&Value>,
        actual: Option<&Value>,
    ) -> Option<String> {
        let text = render_value(expected);
        let selected = if self.when.iter().any(|v| *v == text) {
            &self.then
        } else {
            &self.otherwise
        };
        selected.compare(datatype, expected, actual)
    }
}

/// Declarative comparator description used by configuration files.
///
/// Plain names (`equal`, `ignore`, `case_insensitive`, ...) select the simple
/// comparators; single-key maps carry parameters, e.g. `{ tolerance: 0.01 }`.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparatorSpec {
    Relation(Relation),
    Ignore,
    CaseInsensitive,
    Trimmed,
    Tolerance(Decimal),
    TimestampTolerance { low_ms: i64, high_ms: i64 },
    OneOf(Vec<String>),
    Conditional {
        when: Vec<String>,
        then: Box<ComparatorSpec>,
        otherwise: Box<ComparatorSpec>,
    },
}

impl ComparatorSpec {
    pub fn build(&self) -> SharedComparator {
        match self {
            ComparatorSpec::Relation(Relation::Equal) => equality(),
            ComparatorSpec::Relation(relation) => Arc::new(RelationComparator(*relation)),
            ComparatorSpec::Ignore => Arc::new(Ignore),
            ComparatorSpec::CaseInsensitive => Arc::new(CaseInsensitive),
            ComparatorSpec::Trimmed => Arc::new(Trimmed),
            ComparatorSpec::Tolerance(tolerance) => Arc::new(NumericTolerance {
                tolerance: *tolerance,
            }),
            ComparatorSpec::TimestampTolerance { low_ms, high_ms } => {
                Arc::new(TimestampTolerance {
                    low_ms: *low_ms,
                    high_ms: *high_ms,
                })
            }
            ComparatorSpec::OneOf(values) => Arc::new(OneOf {
                values: values.clone(),
            }),
            ComparatorSpec::Conditional {
                when,
                then,
                otherwise,
            } => Arc::new(Conditional {
                when: when.clone(),
                then: then.build(),
                otherwise: otherwise.build(),
            }),
        }
    }

    fn from_yaml(value: &serde_yaml::Value) -> AnyResult<Self> {
        if let Some(token) = value.as_str() {
            return ComparatorSpec::from_str(token);
        }
        let mapping = value
            .as_mapping()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| anyhow!("Comparator must be a name or a single-key map: {value:?}"))?;
        let Some((key, body)) = mapping.iter().next() else {
            bail!("Comparator map is empty");
        };
        let key = key
            .as_str()
            .ok_or_else(|| anyhow!("Comparator keys must be strings"))?
            .trim()
            .to_ascii_lowercase();
        match key.as_str() {
            "tolerance" => Ok(ComparatorSpec::Tolerance(yaml_decimal(body)?)),
            "timestamp_tolerance_ms" => {
                let ms = yaml_i64(body, "timestamp_tolerance_ms")?;
                Ok(ComparatorSpec::TimestampTolerance {
                    low_ms: ms,
                    high_ms: ms,
                })
            }
            "timestamp_tolerance" => Ok(ComparatorSpec::TimestampTolerance {
                low_ms: yaml_i64(&body["low_ms"], "low_ms")?,
                high_ms: yaml_i64(&body["high_ms"], "high_ms")?,
            }),
            "one_of" => Ok(ComparatorSpec::OneOf(yaml_strings(body)?)),
            "conditional" => Ok(ComparatorSpec::Conditional {
                when: yaml_strings(&body["when"])?,
                then: Box::new(ComparatorSpec::from_yaml(&body["then"])?),
                otherwise: Box::new(ComparatorSpec::from_yaml(&body["otherwise"])?),
            }),
            other => Err(anyhow!("Unknown comparator '{other}'")),
        }
    }
}

fn yaml_decimal(value: &serde_yaml::Value) -> AnyResult<Decimal> {
    let text = match value {
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => bail!("Tolerance must be a number, found {other:?}"),
    };
    let tolerance =
        Decimal::from_str(text.trim()).map_err(|err| anyhow!("Invalid tolerance '{text}': {err}"))?;
    if tolerance.is_sign_negative() {
        bail!("Tolerance must not be negative: {tolerance}");
    }
    Ok(tolerance)
}

fn yaml_i64(value: &serde_yaml::Value, field: &str) -> AnyResult<i64> {
    value
        .as_i64()
        .filter(|ms| *ms >= 0)
        .ok_or_else(|| anyhow!("'{field}' must be a non-negative integer"))
}

fn yaml_strings(value: &serde_yaml::Value) -> AnyResult<Vec<String>> {
    let items = value
        .as_sequence()
        .ok_or_else(|| anyhow!("Expected a list of values, found {value:?}"))?;
    items
        .iter()
        .map(|item| match item {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            serde_yaml::Value::Null => Ok(crate::data::NULL_TEXT.to_string()),
            other => Err(anyhow!("Unsupported list value {other:?}")),
        })
        .collect()
}

impl FromStr for ComparatorSpec {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> AnyResult<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let spec = match normalized.as_str() {
            "equal" | "eq" => ComparatorSpec::Relation(Relation::Equal),
            "not_equal" | "ne" => ComparatorSpec::Relation(Relation::NotEqual),
            "greater_than" | "gt" => ComparatorSpec::Relation(Relation::GreaterThan),
            "greater_or_equal" | "ge" => ComparatorSpec::Relation(Relation::GreaterOrEqual),
            "less_than" | "lt" => ComparatorSpec::Relation(Relation::LessThan),
            "less_or_equal" | "le" => ComparatorSpec::Relation(Relation::LessOrEqual),
            "ignore" => ComparatorSpec::Ignore,
            "case_insensitive" => ComparatorSpec::CaseInsensitive,
            "trimmed" => ComparatorSpec::Trimmed,
            other => bail!("Unknown comparator '{other}'"),
        };
        Ok(spec)
    }
}

impl<'de> Deserialize<'de> for ComparatorSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        ComparatorSpec::from_yaml(&value).map_err(de::Error::custom)
    }
}
