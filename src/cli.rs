use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Assert that tabular data matches an expected snapshot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare an expected CSV file (or directory of CSV files) with an actual one
    Compare(CompareArgs),
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Expected CSV/TSV file, or a directory of them for a dataset comparison
    #[arg(short = 'e', long = "expected")]
    pub expected: PathBuf,
    /// Actual CSV/TSV file, or a directory of them for a dataset comparison
    #[arg(short = 'a', long = "actual")]
    pub actual: PathBuf,
    /// YAML file with comparator, exclusion and row-count settings
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Column patterns to leave out of the comparison (`*`/`?` globs, optionally `TABLE.COLUMN`)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude: Vec<String>,
    /// Columns whose values are echoed in every value failure
    #[arg(long = "additional", action = clap::ArgAction::Append)]
    pub additional: Vec<String>,
    /// Sort both sides by these columns before comparing rows
    #[arg(long = "sort-by", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub sort_by: Vec<String>,
    /// Stop at the first difference instead of collecting all of them
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,
    /// Treat differing row counts as a hard error instead of a reported failure
    #[arg(long = "strict-row-count")]
    pub strict_row_count: bool,
    /// Match table names exactly instead of ignoring case
    #[arg(long = "case-sensitive-tables")]
    pub case_sensitive_tables: bool,
    /// How failures are printed
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
