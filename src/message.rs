//! Diagnostic message formats.
//!
//! Downstream tooling parses these strings, so their shape is fixed:
//!
//! ```text
//! value (table=ORDERS, row=3, col=STATUS, Additional row info: ('ID': expected=<7>, actual=<7>)): Actual value='open' is not equal to expected value='closed'
//! column count (table=ORDERS, expectedColCount=3, actualColCount=4)
//! column mismatch (table=ORDERS)
//! row count (table=ORDERS)
//! Incompatible data types: (table=ORDERS, col=AMOUNT)
//! ```

use std::fmt::Write as _;

pub fn table_count() -> String {
    "table count".to_string()
}

pub fn tables() -> String {
    "tables".to_string()
}

/// `row count (table=T)`; the table clause is dropped when no table name is known.
pub fn row_count(table: &str) -> String {
    if table.is_empty() {
        "row count".to_string()
    } else {
        format!("row count (table={table})")
    }
}

pub fn column_count(table: &str, expected: usize, actual: usize) -> String {
    format!("column count (table={table}, expectedColCount={expected}, actualColCount={actual})")
}

pub fn column_mismatch(table: &str) -> String {
    format!("column mismatch (table={table})")
}

pub fn incompatible_types(table: &str, column: &str) -> String {
    format!("Incompatible data types: (table={table}, col={column})")
}

/// One entry of the additional row info: the column and both rendered values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalColumn {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

pub fn additional_info(columns: &[AdditionalColumn]) -> Option<String> {
    if columns.is_empty() {
        return None;
    }
    let mut info = String::from("Additional row info:");
    for column in columns {
        let _ = write!(
            info,
            " ('{}': expected=<{}>, actual=<{}>)",
            column.column, column.expected, column.actual
        );
    }
    Some(info)
}

pub fn value(
    table: &str,
    row: usize,
    column: &str,
    additional_info: Option<&str>,
    detail: Option<&str>,
) -> String {
    let mut message = format!("value (table={table}, row={row}, col={column}");
    if let Some(info) = additional_info {
        let _ = write!(message, ", {info}");
    }
    message.push(')');
    if let Some(detail) = detail.filter(|d| !d.is_empty()) {
        let _ = write!(message, ": {detail}");
    }
    message
}
