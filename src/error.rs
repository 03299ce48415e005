//! Error type returned at the comparison engine boundary.

use thiserror::Error;

use crate::report::Failure;

pub type Result<T> = std::result::Result<T, AssertError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssertError {
    /// Raised by a fail-fast reporter; carries the first mismatch found.
    #[error("{0}")]
    Failure(Failure),

    #[error("No such column '{column}' in table '{table}'")]
    NoSuchColumn { table: String, column: String },

    #[error("No such table '{table}'")]
    NoSuchTable { table: String },

    #[error("Row {row} is out of bounds for table '{table}'")]
    RowOutOfBounds { table: String, row: usize },

    #[error("Row counts of table '{table}' cannot be compared")]
    NotComparable { table: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AssertError {
    pub fn no_such_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::NoSuchColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn no_such_table(table: impl Into<String>) -> Self {
        Self::NoSuchTable {
            table: table.into(),
        }
    }

    pub fn row_out_of_bounds(table: impl Into<String>, row: usize) -> Self {
        Self::RowOutOfBounds {
            table: table.into(),
            row,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Returns the mismatch carried by a fail-fast abort, if that is what this error is.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            AssertError::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}
