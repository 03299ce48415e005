//! Table alignment: the structural half of a table comparison.
//!
//! [`align`] checks row counts and column sets, then pairs the retained
//! columns of both tables by case-insensitive name and settles the datatype
//! each pair is compared under. Structural mismatches go to the reporter; when
//! the reporter lets the comparison continue, the table is still marked
//! [`Alignment::Mismatched`] so that no value comparison follows.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AssertError, Result},
    filter::ColumnFilter,
    message,
    report::FailureReporter,
    schema::{Column, ColumnType, column_names_text, sorted_columns},
    table::{Table, same_table},
};

/// What to do when a table cannot report its row count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCountPolicy {
    /// Skip the count check and compare the rows that can be read.
    #[default]
    Lenient,
    /// Refuse with [`AssertError::NotComparable`].
    Strict,
}

/// How many rows the differ should walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBound {
    Known(usize),
    /// Neither side can count; read until the expected side runs out.
    UntilExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedColumn {
    pub expected: Column,
    pub actual: Column,
    /// Effective datatype used to interpret both cells.
    pub datatype: ColumnType,
}

impl AlignedColumn {
    pub fn name(&self) -> &str {
        &self.expected.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alignment {
    /// Nothing left to compare: same table object, or both tables empty.
    Identical,
    /// A structural mismatch was reported.
    Mismatched,
    Aligned {
        rows: RowBound,
        columns: Vec<AlignedColumn>,
    },
}

/// Effective datatype of a column pair, or `None` when both sides declare
/// different known types.
pub fn resolve_datatype(expected: ColumnType, actual: ColumnType) -> Option<ColumnType> {
    match (expected, actual) {
        (ColumnType::Unknown, other) => Some(other),
        (other, ColumnType::Unknown) => Some(other),
        (e, a) if e == a => Some(e),
        _ => None,
    }
}

fn same_names(expected: &[Column], actual: &[Column]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual.iter())
            .all(|(e, a)| e.key() == a.key())
}

pub fn align(
    expected: &dyn Table,
    actual: &dyn Table,
    filter: &dyn ColumnFilter,
    policy: RowCountPolicy,
    reporter: &mut dyn FailureReporter,
) -> Result<Alignment> {
    let table = expected.name();
    if same_table(expected, actual) {
        debug!("Table '{table}' compared with itself; skipping");
        return Ok(Alignment::Identical);
    }

    let rows = match (expected.row_count(), actual.row_count()) {
        (Some(expected_rows), Some(actual_rows)) => {
            if expected_rows != actual_rows {
                reporter.handle_failure_with_values(
                    &message::row_count(table),
                    &expected_rows.to_string(),
                    &actual_rows.to_string(),
                )?;
                return Ok(Alignment::Mismatched);
            }
            if expected_rows == 0 {
                debug!("Table '{table}' is empty on both sides");
                return Ok(Alignment::Identical);
            }
            RowBound::Known(expected_rows)
        }
        (expected_rows, actual_rows) => {
            if policy == RowCountPolicy::Strict {
                return Err(AssertError::NotComparable {
                    table: table.to_string(),
                });
            }
            warn!("Row count of table '{table}' is not available; skipping the row count check");
            expected_rows
                .or(actual_rows)
                .map(RowBound::Known)
                .unwrap_or(RowBound::UntilExhausted)
        }
    };

    let expected_columns = sorted_columns(expected.columns());
    let actual_columns = sorted_columns(actual.columns());
    if expected_columns.len() != actual_columns.len() {
        reporter.handle_failure_with_values(
            &message::column_count(table, expected_columns.len(), actual_columns.len()),
            &column_names_text(&expected_columns),
            &column_names_text(&actual_columns),
        )?;
        return Ok(Alignment::Mismatched);
    }
    if !same_names(&expected_columns, &actual_columns) {
        reporter.handle_failure_with_values(
            &message::column_mismatch(table),
            &column_names_text(&expected_columns),
            &column_names_text(&actual_columns),
        )?;
        return Ok(Alignment::Mismatched);
    }

    let expected_kept = expected_columns
        .into_iter()
        .filter(|c| filter.accept(table, c))
        .collect::<Vec<_>>();
    let actual_kept = actual_columns
        .into_iter()
        .filter(|c| filter.accept(table, c))
        .collect::<Vec<_>>();
    if !same_names(&expected_kept, &actual_kept) {
        reporter.handle_failure_with_values(
            &message::column_mismatch(table),
            &column_names_text(&expected_kept),
            &column_names_text(&actual_kept),
        )?;
        return Ok(Alignment::Mismatched);
    }

    let mut columns = Vec::with_capacity(expected_kept.len());
    for (expected_column, actual_column) in expected_kept.into_iter().zip(actual_kept) {
        let datatype = match resolve_datatype(expected_column.datatype, actual_column.datatype) {
            Some(datatype) => datatype,
            None => {
                reporter.handle_failure_with_values(
                    &message::incompatible_types(table, &expected_column.name),
                    expected_column.datatype.as_str(),
                    actual_column.datatype.as_str(),
                )?;
                ColumnType::Unknown
            }
        };
        columns.push(AlignedColumn {
            expected: expected_column,
            actual: actual_column,
            datatype,
        });
    }
    debug!(
        "Aligned {} column(s) of table '{table}' for value comparison",
        columns.len()
    );
    Ok(Alignment::Aligned { rows, columns })
}
