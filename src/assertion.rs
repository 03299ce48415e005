//! Entry points for table and dataset assertions.
//!
//! [`Assertion`] bundles the comparator configuration and [`CompareOptions`]
//! for a run. The `assert_*` methods fail fast and return the first mismatch
//! as [`AssertError::Failure`](crate::error::AssertError::Failure); the
//! `collect_*` methods run to completion and return every mismatch. Custom
//! reporters go through [`Assertion::compare_tables`] and
//! [`Assertion::compare_datasets`].

use log::{debug, info};

use crate::{
    align::{Alignment, RowCountPolicy, align},
    dataset::compare_datasets,
    differ::{RowComparison, compare_rows},
    error::Result,
    filter::{AcceptAll, ColumnFilter},
    report::{CollectAll, FailFast, Failure, FailureReporter},
    resolver::{ColumnComparatorSource, ComparatorSourceProvider, TableComparatorSource},
    table::{Dataset, Table},
};

pub struct CompareOptions {
    column_filter: Box<dyn ColumnFilter>,
    pub additional_columns: Vec<String>,
    pub row_count_policy: RowCountPolicy,
    pub case_sensitive_table_names: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            column_filter: Box::new(AcceptAll),
            additional_columns: Vec::new(),
            row_count_policy: RowCountPolicy::default(),
            case_sensitive_table_names: false,
        }
    }
}

impl CompareOptions {
    pub fn column_filter(mut self, filter: impl ColumnFilter + 'static) -> Self {
        self.column_filter = Box::new(filter);
        self
    }

    pub fn additional_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn row_count_policy(mut self, policy: RowCountPolicy) -> Self {
        self.row_count_policy = policy;
        self
    }

    pub fn case_sensitive_table_names(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_table_names = case_sensitive;
        self
    }

    pub fn filter(&self) -> &dyn ColumnFilter {
        self.column_filter.as_ref()
    }
}

/// Compares one pair of tables: structure first, then every retained cell.
pub fn compare_table(
    expected: &dyn Table,
    actual: &dyn Table,
    source: &ColumnComparatorSource,
    options: &CompareOptions,
    reporter: &mut dyn FailureReporter,
) -> Result<()> {
    let alignment = align(
        expected,
        actual,
        options.filter(),
        options.row_count_policy,
        reporter,
    )?;
    let (rows, columns) = match alignment {
        Alignment::Aligned { rows, columns } => (rows, columns),
        Alignment::Identical | Alignment::Mismatched => {
            debug!("Table '{}' needs no value comparison", expected.name());
            return Ok(());
        }
    };
    let comparison = RowComparison {
        rows,
        columns: &columns,
        source,
        additional_columns: &options.additional_columns,
    };
    compare_rows(expected, actual, &comparison, reporter)?;
    Ok(())
}

#[derive(Default)]
pub struct Assertion {
    comparators: TableComparatorSource,
    options: CompareOptions,
}

impl Assertion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comparators(mut self, comparators: TableComparatorSource) -> Self {
        self.comparators = comparators;
        self
    }

    pub fn with_options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    pub fn compare_tables(
        &self,
        expected: &dyn Table,
        actual: &dyn Table,
        reporter: &mut dyn FailureReporter,
    ) -> Result<()> {
        let source = self.comparators.source_for(expected.name());
        compare_table(expected, actual, &source, &self.options, reporter)
    }

    pub fn compare_datasets(
        &self,
        expected: &dyn Dataset,
        actual: &dyn Dataset,
        reporter: &mut dyn FailureReporter,
    ) -> Result<()> {
        compare_datasets(expected, actual, &self.comparators, &self.options, reporter)
    }

    pub fn assert_tables(&self, expected: &dyn Table, actual: &dyn Table) -> Result<()> {
        self.compare_tables(expected, actual, &mut FailFast)
    }

    pub fn assert_datasets(&self, expected: &dyn Dataset, actual: &dyn Dataset) -> Result<()> {
        self.compare_datasets(expected, actual, &mut FailFast)
    }

    pub fn collect_tables(&self, expected: &dyn Table, actual: &dyn Table) -> Result<Vec<Failure>> {
        let mut reporter = CollectAll::new();
        self.compare_tables(expected, actual, &mut reporter)?;
        info!(
            "Table '{}': {} failure(s) collected",
            expected.name(),
            reporter.len()
        );
        Ok(reporter.into_failures())
    }

    pub fn collect_datasets(
        &self,
        expected: &dyn Dataset,
        actual: &dyn Dataset,
    ) -> Result<Vec<Failure>> {
        let mut reporter = CollectAll::new();
        self.compare_datasets(expected, actual, &mut reporter)?;
        info!("Dataset: {} failure(s) collected", reporter.len());
        Ok(reporter.into_failures())
    }
}

/// Fails fast on the first difference using built-in equality for every column.
pub fn assert_tables_equal(expected: &dyn Table, actual: &dyn Table) -> Result<()> {
    Assertion::new().assert_tables(expected, actual)
}

pub fn assert_datasets_equal(expected: &dyn Dataset, actual: &dyn Dataset) -> Result<()> {
    Assertion::new().assert_datasets(expected, actual)
}

/// Runs a full comparison with built-in equality and returns every difference.
pub fn collect_table_failures(expected: &dyn Table, actual: &dyn Table) -> Result<Vec<Failure>> {
    Assertion::new().collect_tables(expected, actual)
}

pub fn collect_dataset_failures(
    expected: &dyn Dataset,
    actual: &dyn Dataset,
) -> Result<Vec<Failure>> {
    Assertion::new().collect_datasets(expected, actual)
}
