//! Positional row/column value comparison.
//!
//! Rows are matched by index only; callers who want order-independent
//! equality wrap both tables in [`SortedTable`](crate::table::SortedTable)
//! first.

use log::debug;

use crate::{
    align::{AlignedColumn, RowBound},
    comparator::SharedComparator,
    data::{Value, render_value},
    error::{AssertError, Result},
    message::{self, AdditionalColumn},
    report::FailureReporter,
    resolver::ColumnComparatorSource,
    table::Table,
};

/// Everything the differ needs besides the tables themselves.
pub struct RowComparison<'a> {
    pub rows: RowBound,
    pub columns: &'a [AlignedColumn],
    pub source: &'a ColumnComparatorSource,
    /// Columns whose values are appended to every value diagnostic.
    pub additional_columns: &'a [String],
}

fn render_lookup(result: Result<Option<Value>>) -> String {
    match result {
        Ok(value) => render_value(value.as_ref()),
        Err(err) => err.to_string(),
    }
}

fn additional_info(
    expected: &dyn Table,
    actual: &dyn Table,
    row: usize,
    columns: &[String],
) -> Option<String> {
    let entries = columns
        .iter()
        .map(|column| AdditionalColumn {
            column: column.clone(),
            expected: render_lookup(expected.value(row, column)),
            actual: render_lookup(actual.value(row, column)),
        })
        .collect::<Vec<_>>();
    message::additional_info(&entries)
}

/// Whether `table` has a row at `row`, judged by its first aligned column.
fn has_row(table: &dyn Table, row: usize, probe: &str) -> Result<bool> {
    match table.value(row, probe) {
        Ok(_) => Ok(true),
        Err(AssertError::RowOutOfBounds { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Compares every retained cell and returns the number of value mismatches
/// handed to the reporter.
pub fn compare_rows(
    expected: &dyn Table,
    actual: &dyn Table,
    comparison: &RowComparison<'_>,
    reporter: &mut dyn FailureReporter,
) -> Result<usize> {
    let table = expected.name();
    let Some(probe) = comparison.columns.first().map(AlignedColumn::name) else {
        debug!("No columns of table '{table}' left to compare");
        return Ok(0);
    };
    let comparators = comparison
        .columns
        .iter()
        .map(|column| comparison.source.select_comparator(column.name()))
        .collect::<Vec<SharedComparator>>();

    let mut mismatches = 0usize;
    let mut row = 0usize;
    loop {
        match comparison.rows {
            RowBound::Known(count) if row >= count => {
                let expected_more = has_row(expected, row, probe)?;
                if expected_more || has_row(actual, row, probe)? {
                    let more = format!("more than {count}");
                    let (expected_rows, actual_rows) = if expected_more {
                        (more, count.to_string())
                    } else {
                        (count.to_string(), more)
                    };
                    reporter.handle_failure_with_values(
                        &message::row_count(table),
                        &expected_rows,
                        &actual_rows,
                    )?;
                }
                break;
            }
            RowBound::Known(count) => {
                // The count may come from the actual side alone.
                if !has_row(expected, row, probe)? {
                    reporter.handle_failure_with_values(
                        &message::row_count(table),
                        &row.to_string(),
                        &count.to_string(),
                    )?;
                    break;
                }
            }
            RowBound::UntilExhausted => {
                if !has_row(expected, row, probe)? {
                    if has_row(actual, row, probe)? {
                        reporter.handle_failure_with_values(
                            &message::row_count(table),
                            &row.to_string(),
                            &format!("more than {row}"),
                        )?;
                    }
                    break;
                }
            }
        }
        if !has_row(actual, row, probe)? {
            reporter.handle_failure_with_values(
                &message::row_count(table),
                &match comparison.rows {
                    RowBound::Known(count) => count.to_string(),
                    RowBound::UntilExhausted => format!("more than {row}"),
                },
                &row.to_string(),
            )?;
            break;
        }

        for (column, comparator) in comparison.columns.iter().zip(comparators.iter()) {
            let expected_value = expected.value(row, &column.expected.name)?;
            let actual_value = actual.value(row, &column.actual.name)?;
            let Some(detail) = comparator.compare(
                column.datatype,
                expected_value.as_ref(),
                actual_value.as_ref(),
            ) else {
                continue;
            };
            mismatches += 1;
            let info = additional_info(expected, actual, row, comparison.additional_columns);
            let text = message::value(
                table,
                row,
                column.name(),
                info.as_deref(),
                Some(detail.as_str()),
            );
            reporter.handle_failure_with_values(
                &text,
                &render_value(expected_value.as_ref()),
                &render_value(actual_value.as_ref()),
            )?;
        }
        row += 1;
    }
    debug!("Compared {row} row(s) of table '{table}', {mismatches} value mismatch(es)");
    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        align::{Alignment, RowCountPolicy, align},
        comparator::Ignore,
        filter::AcceptAll,
        report::{CollectAll, FailFast, Failure},
        schema::Column,
        table::MemoryTable,
    };

    fn table(rows: Vec<Vec<i64>>) -> MemoryTable {
        MemoryTable::from_rows("T", &["A", "B", "C"], rows).expect("table")
    }

    fn aligned(expected: &MemoryTable, actual: &MemoryTable) -> (RowBound, Vec<AlignedColumn>) {
        match align(expected, actual, &AcceptAll, RowCountPolicy::Lenient, &mut FailFast).unwrap() {
            Alignment::Aligned { rows, columns } => (rows, columns),
            other => panic!("unexpected alignment {other:?}"),
        }
    }

    #[test]
    fn reports_each_mismatching_cell_with_location() {
        let expected = table(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        let actual = table(vec![vec![1, 2, 9], vec![4, 0, 6]]);
        let (rows, columns) = aligned(&expected, &actual);
        let source = ColumnComparatorSource::default();
        let mut reporter = CollectAll::new();
        let comparison = RowComparison {
            rows,
            columns: &columns,
            source: &source,
            additional_columns: &["A".to_string()],
        };
        let count = compare_rows(&expected, &actual, &comparison, &mut reporter).unwrap();
        assert_eq!(count, 2);
        let failures = reporter.failures();
        assert_eq!(
            failures[0].message,
            "value (table=T, row=0, col=C, Additional row info: ('A': expected=<1>, actual=<1>)): Actual value='9' is not equal to expected value='3'"
        );
        assert_eq!(failures[0].expected.as_deref(), Some("3"));
        assert_eq!(failures[0].actual.as_deref(), Some("9"));
        assert!(failures[1].message.starts_with("value (table=T, row=1, col=B"));
    }

    #[test]
    fn resolved_comparator_is_used_per_column() {
        let expected = table(vec![vec![1, 2, 3]]);
        let actual = table(vec![vec![1, 2, 9]]);
        let (rows, columns) = aligned(&expected, &actual);
        let source = ColumnComparatorSource::default().with_column("c", Arc::new(Ignore));
        let comparison = RowComparison {
            rows,
            columns: &columns,
            source: &source,
            additional_columns: &[],
        };
        let count = compare_rows(&expected, &actual, &comparison, &mut FailFast).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn missing_additional_column_is_rendered_inline() {
        let expected = table(vec![vec![1, 2, 3]]);
        let actual = table(vec![vec![1, 2, 4]]);
        let (rows, columns) = aligned(&expected, &actual);
        let source = ColumnComparatorSource::default();
        let comparison = RowComparison {
            rows,
            columns: &columns,
            source: &source,
            additional_columns: &["PK".to_string()],
        };
        let err = compare_rows(&expected, &actual, &comparison, &mut FailFast).unwrap_err();
        let failure = err.as_failure().expect("failure");
        assert!(failure
            .message
            .contains("('PK': expected=<No such column 'PK' in table 'T'>"));
    }

    /// Streams rows without being able to count them.
    struct Uncounted(MemoryTable);

    impl Table for Uncounted {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn columns(&self) -> &[Column] {
            self.0.columns()
        }
        fn row_count(&self) -> Option<usize> {
            None
        }
        fn value(&self, row: usize, column: &str) -> Result<Option<Value>> {
            self.0.value(row, column)
        }
    }

    #[test]
    fn unbounded_rows_stop_when_expected_runs_out() {
        let expected = Uncounted(table(vec![vec![1, 2, 3]]));
        let actual = Uncounted(table(vec![vec![1, 2, 3], vec![4, 5, 6]]));
        let alignment =
            align(&expected, &actual, &AcceptAll, RowCountPolicy::Lenient, &mut FailFast).unwrap();
        let Alignment::Aligned { rows, columns } = alignment else {
            panic!("expected aligned tables");
        };
        assert_eq!(rows, RowBound::UntilExhausted);
        let source = ColumnComparatorSource::default();
        let comparison = RowComparison {
            rows,
            columns: &columns,
            source: &source,
            additional_columns: &[],
        };
        let mut reporter = CollectAll::new();
        compare_rows(&expected, &actual, &comparison, &mut reporter).unwrap();
        assert_eq!(reporter.len(), 1);
        assert_eq!(reporter.failures()[0].message, "row count (table=T)");
        assert_eq!(reporter.failures()[0].expected.as_deref(), Some("1"));
    }

    fn compare_uncounted_expected(
        expected_rows: Vec<Vec<i64>>,
        actual_rows: Vec<Vec<i64>>,
    ) -> CollectAll {
        let expected = Uncounted(table(expected_rows));
        let actual = table(actual_rows);
        let alignment =
            align(&expected, &actual, &AcceptAll, RowCountPolicy::Lenient, &mut FailFast).unwrap();
        let Alignment::Aligned { rows, columns } = alignment else {
            panic!("expected aligned tables");
        };
        let source = ColumnComparatorSource::default();
        let comparison = RowComparison {
            rows,
            columns: &columns,
            source: &source,
            additional_columns: &[],
        };
        let mut reporter = CollectAll::new();
        compare_rows(&expected, &actual, &comparison, &mut reporter).unwrap();
        reporter
    }

    #[test]
    fn shorter_uncounted_expected_is_reported_as_row_count() {
        let reporter =
            compare_uncounted_expected(vec![vec![1, 2, 3]], vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(
            reporter.failures(),
            &[Failure::with_values("row count (table=T)", "1", "2")]
        );
    }

    #[test]
    fn longer_uncounted_expected_is_reported_as_row_count() {
        let reporter =
            compare_uncounted_expected(vec![vec![1, 2, 3], vec![4, 5, 6]], vec![vec![1, 2, 3]]);
        assert_eq!(
            reporter.failures(),
            &[Failure::with_values("row count (table=T)", "more than 1", "1")]
        );
    }
}
