//! Table and dataset collaborators consumed by the comparison engine.
//!
//! The engine only ever talks to [`Table`] and [`Dataset`]; how rows were
//! produced is up to the provider. [`MemoryTable`] and [`MemoryDataset`] are
//! the materialized providers used by the CSV adapter and by tests, and
//! [`SortedTable`] re-orders any table by key columns so that positional row
//! comparison becomes order independent.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;

use crate::{
    data::{Value, compare_optional},
    error::{AssertError, Result},
    schema::{Column, name_key},
};

pub trait Table {
    fn name(&self) -> &str;

    /// Columns in the provider's own order.
    fn columns(&self) -> &[Column];

    /// Number of rows, or `None` when the provider cannot count them.
    fn row_count(&self) -> Option<usize>;

    /// Looks up the cell at `(row, column)`. Unknown column names fail with
    /// [`AssertError::NoSuchColumn`]; rows past the end fail with
    /// [`AssertError::RowOutOfBounds`].
    fn value(&self, row: usize, column: &str) -> Result<Option<Value>>;

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns().iter().find(|c| c.matches(name))
    }
}

pub trait Dataset {
    fn table_names(&self) -> Vec<String>;

    /// Fails with [`AssertError::NoSuchTable`] when `name` is absent.
    fn table(&self, name: &str) -> Result<&dyn Table>;
}

/// True when both references point at the same table object.
pub fn same_table(left: &dyn Table, right: &dyn Table) -> bool {
    std::ptr::addr_eq(left as *const dyn Table, right as *const dyn Table)
}

pub fn same_dataset(left: &dyn Dataset, right: &dyn Dataset) -> bool {
    std::ptr::addr_eq(left as *const dyn Dataset, right as *const dyn Dataset)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Option<Value>>>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds an untyped table from column names and rows of values.
    pub fn from_rows<I, R, V>(name: impl Into<String>, columns: &[&str], rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let columns = columns.iter().map(|c| Column::untyped(*c)).collect();
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row.into_iter().map(|v| Some(v.into())).collect())?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Option<Value>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(AssertError::config(format!(
                "Row {} of table '{}' has {} value(s) but the table defines {} column(s)",
                self.rows.len(),
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn with_row(mut self, row: Vec<Option<Value>>) -> Result<Self> {
        self.push_row(row)?;
        Ok(self)
    }

    /// Copies every row of `table`, in its current order, into memory.
    pub fn materialize(table: &dyn Table) -> Result<Self> {
        let row_count = table
            .row_count()
            .ok_or_else(|| AssertError::NotComparable {
                table: table.name().to_string(),
            })?;
        let mut copy = Self::new(table.name(), table.columns().to_vec());
        for row in 0..row_count {
            let cells = table
                .columns()
                .iter()
                .map(|column| table.value(row, &column.name))
                .collect::<Result<Vec<_>>>()?;
            copy.rows.push(cells);
        }
        Ok(copy)
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.matches(name))
            .ok_or_else(|| AssertError::no_such_column(&self.name, name))
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn row_count(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn value(&self, row: usize, column: &str) -> Result<Option<Value>> {
        let idx = self.column_index(column)?;
        let cells = self
            .rows
            .get(row)
            .ok_or_else(|| AssertError::row_out_of_bounds(&self.name, row))?;
        Ok(cells.get(idx).cloned().flatten())
    }
}

/// Presents the rows of another table ordered by key columns, nulls first.
pub struct SortedTable<'a> {
    inner: &'a dyn Table,
    order: Vec<usize>,
}

impl<'a> SortedTable<'a> {
    pub fn new(inner: &'a dyn Table, keys: &[&str]) -> Result<Self> {
        let row_count = inner
            .row_count()
            .ok_or_else(|| AssertError::NotComparable {
                table: inner.name().to_string(),
            })?;
        let keys = keys
            .iter()
            .map(|key| {
                inner
                    .column(key)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| AssertError::no_such_column(inner.name(), *key))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut keyed = Vec::with_capacity(row_count);
        for row in 0..row_count {
            let values = keys
                .iter()
                .map(|key| inner.value(row, key))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((row, values));
        }
        keyed.sort_by(|(_, left), (_, right)| {
            left.iter()
                .zip(right.iter())
                .map(|(l, r)| compare_optional(l.as_ref(), r.as_ref()))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(
            "Sorted {} row(s) of '{}' by [{}]",
            row_count,
            inner.name(),
            keys.iter().join(", ")
        );
        Ok(Self {
            inner,
            order: keyed.into_iter().map(|(row, _)| row).collect(),
        })
    }

    /// Sorts by every column, in the table's own column order.
    pub fn by_all_columns(inner: &'a dyn Table) -> Result<Self> {
        let names = inner
            .columns()
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>();
        let keys = names.iter().map(String::as_str).collect::<Vec<_>>();
        Self::new(inner, &keys)
    }
}

impl Table for SortedTable<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn columns(&self) -> &[Column] {
        self.inner.columns()
    }

    fn row_count(&self) -> Option<usize> {
        Some(self.order.len())
    }

    fn value(&self, row: usize, column: &str) -> Result<Option<Value>> {
        let source_row = *self
            .order
            .get(row)
            .ok_or_else(|| AssertError::row_out_of_bounds(self.inner.name(), row))?;
        self.inner.value(source_row, column)
    }
}

/// Named collection of [`MemoryTable`]s. Lookups ignore case unless the
/// dataset is built with [`MemoryDataset::case_sensitive`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    tables: Vec<MemoryTable>,
    case_sensitive: bool,
    index: HashMap<String, usize>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive() -> Self {
        Self {
            case_sensitive: true,
            ..Self::default()
        }
    }

    fn lookup_key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name_key(name)
        }
    }

    pub fn add_table(&mut self, table: MemoryTable) -> Result<()> {
        let key = self.lookup_key(table.name());
        if self.index.contains_key(&key) {
            return Err(AssertError::config(format!(
                "Duplicate table '{}' in dataset",
                table.name()
            )));
        }
        self.index.insert(key, self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    pub fn with_table(mut self, table: MemoryTable) -> Result<Self> {
        self.add_table(table)?;
        Ok(self)
    }

    pub fn tables(&self) -> &[MemoryTable] {
        &self.tables
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Dataset for MemoryDataset {
    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name().to_string()).collect()
    }

    fn table(&self, name: &str) -> Result<&dyn Table> {
        self.index
            .get(&self.lookup_key(name))
            .and_then(|idx| self.tables.get(*idx))
            .map(|t| t as &dyn Table)
            .ok_or_else(|| AssertError::no_such_table(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> MemoryTable {
        MemoryTable::from_rows(
            "PEOPLE",
            &["ID", "NAME"],
            vec![
                vec![Value::from(3), Value::from("carol")],
                vec![Value::from(1), Value::from("alice")],
                vec![Value::from(2), Value::from("bob")],
            ],
        )
        .expect("build table")
    }

    #[test]
    fn memory_table_looks_up_columns_case_insensitively() {
        let table = people();
        assert_eq!(
            table.value(1, "name").unwrap(),
            Some(Value::from("alice"))
        );
        assert!(matches!(
            table.value(0, "missing"),
            Err(AssertError::NoSuchColumn { .. })
        ));
        assert!(matches!(
            table.value(9, "ID"),
            Err(AssertError::RowOutOfBounds { row: 9, .. })
        ));
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut table = MemoryTable::new("T", vec![Column::untyped("A")]);
        assert!(table.push_row(vec![None, None]).is_err());
        assert!(table.push_row(vec![None]).is_ok());
    }

    #[test]
    fn sorted_table_orders_rows_by_key() {
        let table = people();
        let sorted = SortedTable::new(&table, &["id"]).expect("sort");
        let names = (0..3)
            .map(|row| sorted.value(row, "NAME").unwrap().unwrap().as_display())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn materialize_keeps_sorted_order() {
        let table = people();
        let sorted = SortedTable::new(&table, &["NAME"]).expect("sort");
        let copy = MemoryTable::materialize(&sorted).expect("materialize");
        assert_eq!(copy.name(), "PEOPLE");
        assert_eq!(copy.rows()[0][0], Some(Value::from(1)));
        assert_eq!(copy.rows()[2][1], Some(Value::from("carol")));
    }

    #[test]
    fn memory_dataset_respects_case_sensitivity() {
        let dataset = MemoryDataset::new().with_table(people()).unwrap();
        assert!(dataset.table("people").is_ok());

        let strict = MemoryDataset::case_sensitive()
            .with_table(people())
            .unwrap();
        assert!(matches!(
            strict.table("people"),
            Err(AssertError::NoSuchTable { .. })
        ));
        assert!(strict.table("PEOPLE").is_ok());
    }

    #[test]
    fn same_table_detects_identity() {
        let left = people();
        let right = people();
        assert!(same_table(&left, &left));
        assert!(!same_table(&left, &right));
    }
}
