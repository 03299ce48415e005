pub mod align;
pub mod assertion;
pub mod cli;
pub mod comparator;
pub mod config;
pub mod csv_source;
pub mod data;
pub mod dataset;
pub mod differ;
pub mod error;
pub mod filter;
pub mod message;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod table;

pub use assertion::{
    Assertion, CompareOptions, assert_datasets_equal, assert_tables_equal, collect_dataset_failures,
    collect_table_failures,
};
pub use error::AssertError;
pub use report::{CollectAll, FailFast, Failure, FailureReporter};
pub use table::{Dataset, MemoryDataset, MemoryTable, SortedTable, Table};

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    align::RowCountPolicy,
    cli::{Cli, Commands, CompareArgs, OutputFormat},
    config::CompareConfig,
    csv_source::{CsvOptions, load_dataset, load_table, resolve_encoding},
    report::render_failures,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_assert", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compare(args) => handle_compare(&args),
    }
}

fn load_config(args: &CompareArgs) -> Result<CompareConfig> {
    let mut config = match &args.config {
        Some(path) => {
            CompareConfig::load(path).with_context(|| format!("Loading config from {path:?}"))?
        }
        None => CompareConfig::default(),
    };
    config.exclude.extend(args.exclude.iter().cloned());
    config
        .additional_columns
        .extend(args.additional.iter().cloned());
    if args.strict_row_count {
        config.row_count = RowCountPolicy::Strict;
    }
    if args.case_sensitive_tables {
        config.case_sensitive_table_names = true;
    }
    Ok(config)
}

/// Re-orders `table` by the sort keys. With `require_all` unset, keys the
/// table lacks are skipped and a table with none of them is left as is.
fn sort_table(table: MemoryTable, keys: &[String], require_all: bool) -> Result<MemoryTable> {
    let keys = keys
        .iter()
        .map(String::as_str)
        .filter(|key| require_all || table.column(key).is_some())
        .collect::<Vec<_>>();
    if keys.is_empty() {
        return Ok(table);
    }
    let sorted = SortedTable::new(&table, &keys)?;
    Ok(MemoryTable::materialize(&sorted)?)
}

fn sort_dataset(dataset: MemoryDataset, keys: &[String]) -> Result<MemoryDataset> {
    if keys.is_empty() {
        return Ok(dataset);
    }
    let mut sorted = if dataset.is_case_sensitive() {
        MemoryDataset::case_sensitive()
    } else {
        MemoryDataset::new()
    };
    for table in dataset.tables() {
        sorted.add_table(sort_table(table.clone(), keys, false)?)?;
    }
    Ok(sorted)
}

/// Turns a fail-fast outcome into the list of failures it carried.
fn fail_fast_failures(outcome: error::Result<()>) -> Result<Vec<Failure>> {
    match outcome {
        Ok(()) => Ok(Vec::new()),
        Err(AssertError::Failure(failure)) => Ok(vec![failure]),
        Err(err) => Err(err.into()),
    }
}

fn handle_compare(args: &CompareArgs) -> Result<()> {
    let config = load_config(args)?;
    let assertion = config.assertion()?;
    let csv_options = CsvOptions {
        delimiter: args.delimiter,
        encoding: resolve_encoding(args.input_encoding.as_deref())?,
        case_sensitive_table_names: config.case_sensitive_table_names,
    };
    if let Some(delimiter) = args.delimiter {
        debug!("Reading inputs with delimiter '{}'", printable_delimiter(delimiter));
    }

    let failures = match (args.expected.is_dir(), args.actual.is_dir()) {
        (false, false) => {
            info!(
                "Comparing table {:?} against {:?}",
                args.expected, args.actual
            );
            let expected = sort_table(load_input(&args.expected, &csv_options)?, &args.sort_by, true)?;
            let actual = sort_table(load_input(&args.actual, &csv_options)?, &args.sort_by, true)?;
            if args.fail_fast {
                fail_fast_failures(assertion.assert_tables(&expected, &actual))?
            } else {
                assertion.collect_tables(&expected, &actual)?
            }
        }
        (true, true) => {
            info!(
                "Comparing dataset {:?} against {:?}",
                args.expected, args.actual
            );
            let expected = sort_dataset(load_dataset(&args.expected, &csv_options)?, &args.sort_by)?;
            let actual = sort_dataset(load_dataset(&args.actual, &csv_options)?, &args.sort_by)?;
            if args.fail_fast {
                fail_fast_failures(assertion.assert_datasets(&expected, &actual))?
            } else {
                assertion.collect_datasets(&expected, &actual)?
            }
        }
        _ => bail!(
            "Expected {:?} and actual {:?} must both be files or both be directories",
            args.expected,
            args.actual
        ),
    };

    emit_failures(&failures, args.format)?;
    if failures.is_empty() {
        info!("No differences found");
        Ok(())
    } else {
        Err(anyhow!("{} difference(s) found", failures.len()))
    }
}

fn load_input(path: &Path, options: &CsvOptions) -> Result<MemoryTable> {
    load_table(path, options).with_context(|| format!("Loading table from {path:?}"))
}

fn emit_failures(failures: &[Failure], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if !failures.is_empty() {
                print!("{}", render_failures(failures));
            }
        }
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(failures).context("Serializing failures as JSON")?;
            println!("{json}");
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
