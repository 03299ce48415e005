//! Dataset comparison: table-set checks, then one table comparison per name.

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    assertion::{CompareOptions, compare_table},
    error::{AssertError, Result},
    message,
    report::FailureReporter,
    resolver::ComparatorSourceProvider,
    schema::name_key,
    table::{Dataset, same_dataset},
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableName {
    key: String,
    name: String,
}

fn sorted_table_names(dataset: &dyn Dataset, case_sensitive: bool) -> Vec<TableName> {
    dataset
        .table_names()
        .into_iter()
        .map(|name| TableName {
            key: if case_sensitive {
                name.clone()
            } else {
                name_key(&name)
            },
            name,
        })
        .sorted_by(|left, right| left.key.cmp(&right.key))
        .collect()
}

fn names_text(names: &[TableName]) -> String {
    format!("[{}]", names.iter().map(|n| n.key.as_str()).join(", "))
}

/// Compares two datasets table by table.
///
/// Table count and table names are always both checked; a name mismatch does
/// not stop the tables present on both sides from being compared.
pub fn compare_datasets(
    expected: &dyn Dataset,
    actual: &dyn Dataset,
    provider: &dyn ComparatorSourceProvider,
    options: &CompareOptions,
    reporter: &mut dyn FailureReporter,
) -> Result<()> {
    if same_dataset(expected, actual) {
        debug!("Dataset compared with itself; skipping");
        return Ok(());
    }

    let expected_names = sorted_table_names(expected, options.case_sensitive_table_names);
    let actual_names = sorted_table_names(actual, options.case_sensitive_table_names);

    if expected_names.len() != actual_names.len() {
        reporter.handle_failure_with_values(
            &message::table_count(),
            &expected_names.len().to_string(),
            &actual_names.len().to_string(),
        )?;
    }
    let names_match = expected_names
        .iter()
        .map(|n| &n.key)
        .eq(actual_names.iter().map(|n| &n.key));
    if !names_match {
        reporter.handle_failure_with_values(
            &message::tables(),
            &names_text(&expected_names),
            &names_text(&actual_names),
        )?;
    }

    for table_name in &expected_names {
        let actual_table = match actual_names.iter().find(|n| n.key == table_name.key) {
            Some(found) => actual.table(&found.name),
            None => Err(AssertError::no_such_table(&table_name.name)),
        };
        let actual_table = match actual_table {
            Ok(table) => table,
            Err(AssertError::NoSuchTable { table }) if !names_match => {
                warn!("Table '{table}' is missing from the actual dataset; skipping its rows");
                continue;
            }
            Err(err) => return Err(err),
        };
        let expected_table = expected.table(&table_name.name)?;
        let source = provider.source_for(&table_name.name);
        compare_table(expected_table, actual_table, &source, options, reporter)?;
    }
    info!("Compared {} table(s)", expected_names.len());
    Ok(())
}
