//! YAML comparison configuration.
//!
//! ```yaml
//! default: equal
//! case_sensitive_table_names: false
//! row_count: lenient
//! exclude: ["*_TS"]
//! additional_columns: [ID]
//! tables:
//!   ORDERS:
//!     default: { tolerance: 0.01 }
//!     columns:
//!       STATUS: case_insensitive
//!     exclude: [NOTE]
//! ```

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::{
    align::RowCountPolicy,
    assertion::{Assertion, CompareOptions},
    comparator::{ComparatorSpec, equality},
    filter::ColumnPatternFilter,
    resolver::{ColumnComparatorSource, ComparatorDefaults, TableComparatorSource},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    pub default: Option<ComparatorSpec>,
    pub columns: BTreeMap<String, ComparatorSpec>,
    pub exclude: Vec<String>,
}

impl TableConfig {
    fn source(&self) -> ColumnComparatorSource {
        // An empty column map means "not configured" so the global map still applies.
        let columns = (!self.columns.is_empty()).then(|| {
            self.columns
                .iter()
                .map(|(column, spec)| (column.clone(), spec.build()))
                .collect()
        });
        ColumnComparatorSource::new(self.default.as_ref().map(ComparatorSpec::build), columns)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    pub default: Option<ComparatorSpec>,
    pub case_sensitive_table_names: bool,
    pub row_count: RowCountPolicy,
    pub exclude: Vec<String>,
    pub additional_columns: Vec<String>,
    pub tables: BTreeMap<String, TableConfig>,
}

impl CompareConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: CompareConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        debug!(
            "Loaded comparison config with {} table section(s) from {path:?}",
            config.tables.len()
        );
        Ok(config)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing config YAML")
    }

    pub fn comparator_defaults(&self) -> ComparatorDefaults {
        let default = self
            .default
            .as_ref()
            .map(ComparatorSpec::build)
            .unwrap_or_else(equality);
        ComparatorDefaults::new(default)
    }

    pub fn comparators(&self) -> TableComparatorSource {
        self.tables.iter().fold(
            TableComparatorSource::new().with_defaults(self.comparator_defaults()),
            |source, (table, config)| source.with_table(table, config.source()),
        )
    }

    /// Global exclusions plus table exclusions qualified as `TABLE.pattern`.
    pub fn column_filter(&self) -> Result<ColumnPatternFilter> {
        let mut filter = ColumnPatternFilter::excluding(&self.exclude)?;
        for (table, config) in &self.tables {
            for pattern in &config.exclude {
                filter.exclude(&format!("{table}.{pattern}"))?;
            }
        }
        Ok(filter)
    }

    pub fn options(&self) -> Result<CompareOptions> {
        Ok(CompareOptions::default()
            .column_filter(self.column_filter()?)
            .additional_columns(self.additional_columns.iter().cloned())
            .row_count_policy(self.row_count)
            .case_sensitive_table_names(self.case_sensitive_table_names))
    }

    pub fn assertion(&self) -> Result<Assertion> {
        Ok(Assertion::new()
            .with_comparators(self.comparators())
            .with_options(self.options()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value, filter::ColumnFilter, resolver::ComparatorSourceProvider,
        schema::{Column, ColumnType},
    };

    const SAMPLE: &str = r#"
default: trimmed
row_count: strict
exclude: ["*_TS"]
additional_columns: [ID]
tables:
  orders:
    columns:
      STATUS: case_insensitive
    exclude: [NOTE]
"#;

    #[test]
    fn parses_sample_config() {
        let config = CompareConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.row_count, RowCountPolicy::Strict);
        assert_eq!(config.additional_columns, vec!["ID".to_string()]);
        assert_eq!(
            config.tables["orders"].columns["STATUS"],
            ComparatorSpec::CaseInsensitive
        );
    }

    #[test]
    fn comparators_follow_precedence() {
        let config = CompareConfig::from_yaml_str(SAMPLE).unwrap();
        let source = config.comparators().source_for("ORDERS");
        let status = source.select_comparator("status");
        assert!(status
            .compare(ColumnType::String, Some(&Value::from("Open")), Some(&Value::from("OPEN")))
            .is_none());
        let other = source.select_comparator("amount");
        assert!(other
            .compare(ColumnType::String, Some(&Value::from(" 5")), Some(&Value::from("5 ")))
            .is_none());
    }

    #[test]
    fn column_filter_combines_global_and_table_patterns() {
        let config = CompareConfig::from_yaml_str(SAMPLE).unwrap();
        let filter = config.column_filter().unwrap();
        assert!(!filter.accept("orders", &Column::untyped("CREATED_TS")));
        assert!(!filter.accept("ORDERS", &Column::untyped("note")));
        assert!(filter.accept("ITEMS", &Column::untyped("NOTE")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(CompareConfig::from_yaml_str("colums: {}").is_err());
    }
}
