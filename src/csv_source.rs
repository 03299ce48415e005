//! Materializes CSV/TSV files into in-memory tables.
//!
//! - **Delimiter**: `.tsv` files default to tab, everything else to comma,
//!   unless one is given explicitly.
//! - **Encoding**: input is decoded through `encoding_rs`, defaulting to UTF-8.
//! - **Types**: a `<stem>.schema.yaml` file next to the data file, when
//!   present, types the columns; otherwise columns are `unknown` and cells
//!   stay strings. Empty fields are nulls.
//! - **Datasets**: every `.csv`/`.tsv` file of a directory becomes one table
//!   named after its file stem.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    data::parse_typed_value,
    schema::{Column, TableSchema},
    table::{MemoryDataset, MemoryTable, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
const SCHEMA_SUFFIX: &str = ".schema.yaml";

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub case_sensitive_table_names: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            case_sensitive_table_names: false,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or(if has_extension(path, "tsv") {
        DEFAULT_TSV_DELIMITER
    } else {
        DEFAULT_CSV_DELIMITER
    })
}

fn table_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a table name from {path:?}"))
}

/// `<dir>/<stem>.schema.yaml` for `<dir>/<stem>.csv`.
pub fn schema_path_for(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    Some(path.with_file_name(format!("{stem}{SCHEMA_SUFFIX}")))
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect()
}

/// Reads one delimited file into a [`MemoryTable`].
pub fn load_table(path: &Path, options: &CsvOptions) -> Result<MemoryTable> {
    let delimiter = resolve_input_delimiter(path, options.delimiter);
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(BufReader::new(file));

    let headers = decode_record(
        reader
            .byte_headers()
            .with_context(|| format!("Reading headers of {path:?}"))?,
        options.encoding,
    )?;
    let columns = match schema_path_for(path).filter(|p| p.is_file()) {
        Some(schema_path) => {
            debug!("Typing {path:?} with schema {schema_path:?}");
            TableSchema::load(&schema_path)?.columns_for_headers(&headers)
        }
        None => headers.iter().map(Column::untyped).collect(),
    };

    let mut table = MemoryTable::new(table_name(path)?, columns.clone());
    for (row_idx, record) in reader.byte_records().enumerate() {
        // Line numbers are 1-based and the header occupies line 1.
        let line = row_idx + 2;
        let record = record.with_context(|| format!("Reading row {line} in {path:?}"))?;
        let fields = decode_record(&record, options.encoding)?;
        let row = columns
            .iter()
            .zip(fields.iter())
            .map(|(column, field)| {
                parse_typed_value(field, &column.datatype)
                    .with_context(|| format!("Row {line} column '{}' in {path:?}", column.name))
            })
            .collect::<Result<Vec<_>>>()?;
        table.push_row(row)?;
    }
    info!(
        "Loaded table '{}' with {} row(s) from {path:?}",
        table.name(),
        table.rows().len()
    );
    Ok(table)
}

fn is_data_file(path: &Path) -> bool {
    path.is_file() && (has_extension(path, "csv") || has_extension(path, "tsv"))
}

/// Reads every `.csv`/`.tsv` file in `dir` into a [`MemoryDataset`].
pub fn load_dataset(dir: &Path, options: &CsvOptions) -> Result<MemoryDataset> {
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("Listing dataset directory {dir:?}"))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Listing dataset directory {dir:?}"))?;
    paths.retain(|p| is_data_file(p));
    paths.sort();

    let mut dataset = if options.case_sensitive_table_names {
        MemoryDataset::case_sensitive()
    } else {
        MemoryDataset::new()
    };
    for path in &paths {
        dataset.add_table(load_table(path, options)?)?;
    }
    info!("Loaded {} table(s) from {dir:?}", dataset.len());
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use tempfile::tempdir;

    use super::*;
    use crate::{data::Value, schema::ColumnType};

    #[test]
    fn delimiter_follows_extension_unless_provided() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.CSV"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn load_table_types_columns_from_sidecar_schema() {
        let dir = tempdir().expect("temp dir");
        let csv_path = dir.path().join("orders.csv");
        fs::write(&csv_path, "id,amount,note\n1,2.50,\n2,3.75,rush\n").unwrap();
        fs::write(
            dir.path().join("orders.schema.yaml"),
            "columns:\n  - name: id\n    datatype: integer\n  - name: amount\n    datatype: decimal\n",
        )
        .unwrap();

        let table = load_table(&csv_path, &CsvOptions::default()).unwrap();
        assert_eq!(table.name(), "orders");
        assert_eq!(table.row_count(), Some(2));
        assert_eq!(table.columns()[0].datatype, ColumnType::Integer);
        assert_eq!(table.columns()[2].datatype, ColumnType::Unknown);
        assert_eq!(table.value(0, "id").unwrap(), Some(Value::Integer(1)));
        assert_eq!(table.value(0, "note").unwrap(), None);
        assert_eq!(
            table.value(1, "note").unwrap(),
            Some(Value::from("rush"))
        );
    }

    #[test]
    fn load_table_reports_bad_typed_cells() {
        let dir = tempdir().expect("temp dir");
        let csv_path = dir.path().join("t.csv");
        fs::write(&csv_path, "id\nabc\n").unwrap();
        fs::write(
            dir.path().join("t.schema.yaml"),
            "columns:\n  - name: id\n    datatype: integer\n",
        )
        .unwrap();
        let err = load_table(&csv_path, &CsvOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 2 column 'id'"));
    }

    #[test]
    fn load_dataset_reads_only_data_files() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("b.tsv"), "y\tz\n1\t2\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let dataset = load_dataset(dir.path(), &CsvOptions::default()).unwrap();
        assert_eq!(dataset.len(), 2);
    }
}
