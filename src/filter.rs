//! Column exclusion predicates.
//!
//! A [`ColumnFilter`] decides which columns take part in value comparison.
//! [`ColumnPatternFilter`] matches column names against wildcard patterns
//! (`*` any run, `?` one character), optionally qualified with a table name
//! as `TABLE.COLUMN`. A dot inside a column name is written `\.`, so
//! `LOAD\.TS` matches the column `LOAD.TS` in every table. Matching ignores
//! case.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::schema::Column;

pub trait ColumnFilter {
    fn accept(&self, table: &str, column: &Column) -> bool;
}

/// Keeps every column.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ColumnFilter for AcceptAll {
    fn accept(&self, _: &str, _: &Column) -> bool {
        true
    }
}

impl<F> ColumnFilter for F
where
    F: Fn(&str, &Column) -> bool,
{
    fn accept(&self, table: &str, column: &Column) -> bool {
        self(table, column)
    }
}

#[derive(Debug, Clone)]
struct ColumnPattern {
    raw: String,
    table: Option<Regex>,
    column: Regex,
}

impl ColumnPattern {
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (table, column) = match split_qualifier(trimmed) {
            Some((table, column)) => (Some(glob_regex(table)?), glob_regex(column)?),
            None => (None, glob_regex(trimmed)?),
        };
        Ok(Self {
            raw: trimmed.to_string(),
            table,
            column,
        })
    }

    fn matches(&self, table: &str, column: &str) -> bool {
        self.table.as_ref().is_none_or(|re| re.is_match(table)) && self.column.is_match(column)
    }
}

/// Splits `TABLE.COLUMN` at the first unescaped dot. Patterns without a
/// non-empty table part are column-only.
fn split_qualifier(pattern: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (idx, ch) in pattern.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            '.' if !escaped => {
                return (idx > 0).then(|| (&pattern[..idx], &pattern[idx + 1..]));
            }
            _ => escaped = false,
        }
    }
    None
}

fn glob_regex(pattern: &str) -> Result<Regex> {
    let unescaped = pattern.trim().replace("\\.", ".");
    let escaped = regex::escape(&unescaped)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    RegexBuilder::new(&format!("^{escaped}$"))
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Compiling column pattern '{pattern}'"))
}

#[derive(Debug, Clone, Default)]
pub struct ColumnPatternFilter {
    include: Vec<ColumnPattern>,
    exclude: Vec<ColumnPattern>,
}

impl ColumnPatternFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut filter = Self::new();
        for pattern in patterns {
            filter.exclude(pattern.as_ref())?;
        }
        Ok(filter)
    }

    pub fn include(&mut self, pattern: &str) -> Result<&mut Self> {
        self.include.push(ColumnPattern::parse(pattern)?);
        Ok(self)
    }

    pub fn exclude(&mut self, pattern: &str) -> Result<&mut Self> {
        self.exclude.push(ColumnPattern::parse(pattern)?);
        Ok(self)
    }

    pub fn excluded_patterns(&self) -> Vec<&str> {
        self.exclude.iter().map(|p| p.raw.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

impl ColumnFilter for ColumnPatternFilter {
    fn accept(&self, table: &str, column: &Column) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| p.matches(table, &column.name));
        included && !self.exclude.iter().any(|p| p.matches(table, &column.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_patterns_match_wildcards_and_ignore_case() {
        let filter = ColumnPatternFilter::excluding(&["*_ts", "audit_?"]).unwrap();
        assert!(!filter.accept("T", &Column::untyped("CREATED_TS")));
        assert!(!filter.accept("T", &Column::untyped("Audit_1")));
        assert!(filter.accept("T", &Column::untyped("AUDIT_10")));
        assert!(filter.accept("T", &Column::untyped("ID")));
    }

    #[test]
    fn table_qualified_patterns_only_apply_to_that_table() {
        let filter = ColumnPatternFilter::excluding(&["orders.note"]).unwrap();
        assert!(!filter.accept("ORDERS", &Column::untyped("NOTE")));
        assert!(filter.accept("CUSTOMERS", &Column::untyped("NOTE")));
    }

    #[test]
    fn escaped_dots_match_dotted_column_names() {
        let filter = ColumnPatternFilter::excluding(&[r"load\.ts", r"orders.raw\.*"]).unwrap();
        assert!(!filter.accept("ORDERS", &Column::untyped("LOAD.TS")));
        assert!(!filter.accept("CUSTOMERS", &Column::untyped("load.ts")));
        assert!(filter.accept("T", &Column::untyped("LOADXTS")));
        assert!(!filter.accept("ORDERS", &Column::untyped("RAW.JSON")));
        assert!(filter.accept("CUSTOMERS", &Column::untyped("RAW.JSON")));
    }

    #[test]
    fn include_patterns_restrict_columns() {
        let mut filter = ColumnPatternFilter::new();
        filter.include("id").unwrap().include("name").unwrap();
        filter.exclude("name").unwrap();
        assert!(filter.accept("T", &Column::untyped("ID")));
        assert!(!filter.accept("T", &Column::untyped("NAME")));
        assert!(!filter.accept("T", &Column::untyped("AGE")));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let filter = ColumnPatternFilter::excluding(&["a+b"]).unwrap();
        assert!(!filter.accept("T", &Column::untyped("A+B")));
        assert!(filter.accept("T", &Column::untyped("AAB")));
    }
}
