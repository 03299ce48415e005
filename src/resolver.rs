//! Comparator resolution.
//!
//! Resolution is most-specific-wins: an explicit column entry beats the
//! table's default comparator, which beats the caller's fallback default,
//! which beats the global [`ComparatorDefaults`], which ends in built-in
//! equality. A level that has nothing configured falls through as a whole;
//! column maps are never merged across levels.

use std::collections::HashMap;

use log::trace;

use crate::{
    comparator::{SharedComparator, equality},
    schema::name_key,
};

pub type ColumnComparators = HashMap<String, SharedComparator>;

fn normalize_keys(columns: ColumnComparators) -> ColumnComparators {
    columns
        .into_iter()
        .map(|(name, cmp)| (name_key(&name), cmp))
        .collect()
}

/// Comparators available for the columns of one table.
#[derive(Debug, Clone, Default)]
pub struct ColumnComparatorSource {
    default: Option<SharedComparator>,
    columns: Option<ColumnComparators>,
}

impl ColumnComparatorSource {
    pub fn new(default: Option<SharedComparator>, columns: Option<ColumnComparators>) -> Self {
        Self {
            default,
            columns: columns.map(normalize_keys),
        }
    }

    pub fn with_default(mut self, comparator: SharedComparator) -> Self {
        self.default = Some(comparator);
        self
    }

    pub fn with_column(mut self, column: &str, comparator: SharedComparator) -> Self {
        self.columns
            .get_or_insert_with(HashMap::new)
            .insert(name_key(column), comparator);
        self
    }

    pub fn default_comparator(&self) -> Option<&SharedComparator> {
        self.default.as_ref()
    }

    pub fn column_comparators(&self) -> Option<&ColumnComparators> {
        self.columns.as_ref()
    }

    /// Picks the comparator for `column`. Never fails: an unconfigured source
    /// answers with built-in equality.
    pub fn select_comparator(&self, column: &str) -> SharedComparator {
        if let Some(cmp) = self
            .columns
            .as_ref()
            .and_then(|columns| columns.get(&name_key(column)))
        {
            trace!("Column '{column}' uses its explicit comparator");
            return cmp.clone();
        }
        self.default.clone().unwrap_or_else(equality)
    }

    /// Returns a copy whose missing default and missing column map are filled
    /// from `defaults` for `table`. `self` is left untouched.
    pub fn apply_table_defaults(&self, table: &str, defaults: &ComparatorDefaults) -> Self {
        Self {
            default: self
                .default
                .clone()
                .or_else(|| Some(defaults.default_comparator())),
            columns: self
                .columns
                .clone()
                .or_else(|| defaults.column_comparators(table).cloned()),
        }
    }
}

/// Global fallback configuration, constructed by the caller and threaded
/// through each comparison.
#[derive(Debug, Clone)]
pub struct ComparatorDefaults {
    default: SharedComparator,
    table_columns: HashMap<String, ColumnComparators>,
}

impl Default for ComparatorDefaults {
    fn default() -> Self {
        Self {
            default: equality(),
            table_columns: HashMap::new(),
        }
    }
}

impl ComparatorDefaults {
    pub fn new(default: SharedComparator) -> Self {
        Self {
            default,
            table_columns: HashMap::new(),
        }
    }

    pub fn with_table_columns(mut self, table: &str, columns: ColumnComparators) -> Self {
        self.table_columns
            .insert(name_key(table), normalize_keys(columns));
        self
    }

    pub fn default_comparator(&self) -> SharedComparator {
        self.default.clone()
    }

    pub fn column_comparators(&self, table: &str) -> Option<&ColumnComparators> {
        self.table_columns.get(&name_key(table))
    }
}

/// Supplies the effective [`ColumnComparatorSource`] for a table name.
pub trait ComparatorSourceProvider {
    fn source_for(&self, table: &str) -> ColumnComparatorSource;
}

impl ComparatorSourceProvider for ComparatorDefaults {
    fn source_for(&self, table: &str) -> ColumnComparatorSource {
        ColumnComparatorSource::default().apply_table_defaults(table, self)
    }
}

impl<F> ComparatorSourceProvider for F
where
    F: Fn(&str) -> ColumnComparatorSource,
{
    fn source_for(&self, table: &str) -> ColumnComparatorSource {
        self(table)
    }
}

/// Per-table comparator configuration for a whole dataset.
#[derive(Debug, Clone, Default)]
pub struct TableComparatorSource {
    tables: HashMap<String, ColumnComparatorSource>,
    fallback_default: Option<SharedComparator>,
    defaults: Option<ComparatorDefaults>,
}

impl TableComparatorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, source: ColumnComparatorSource) -> Self {
        self.tables.insert(name_key(table), source);
        self
    }

    /// Default comparator for tables whose own source does not name one.
    pub fn with_fallback_default(mut self, comparator: SharedComparator) -> Self {
        self.fallback_default = Some(comparator);
        self
    }

    pub fn with_defaults(mut self, defaults: ComparatorDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn table(&self, table: &str) -> Option<&ColumnComparatorSource> {
        self.tables.get(&name_key(table))
    }
}

impl ComparatorSourceProvider for TableComparatorSource {
    fn source_for(&self, table: &str) -> ColumnComparatorSource {
        let mut source = self.table(table).cloned().unwrap_or_default();
        if source.default.is_none() {
            source.default = self.fallback_default.clone();
        }
        match &self.defaults {
            Some(defaults) => source.apply_table_defaults(table, defaults),
            None => source.apply_table_defaults(table, &ComparatorDefaults::default()),
        }
    }
}
