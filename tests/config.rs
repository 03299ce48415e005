mod common;

use common::TestWorkspace;
use csv_assert::{
    AssertError, MemoryTable,
    align::RowCountPolicy,
    config::CompareConfig,
    csv_source::{CsvOptions, load_table},
    data::Value,
    schema::Column,
    table::Table,
};

const CONFIG: &str = r#"
exclude: ["*_TS"]
additional_columns: [ID]
tables:
  prices:
    columns:
      AMOUNT: { tolerance: 0.05 }
      STATUS: case_insensitive
      NOTE: ignore
"#;

fn prices(rows: &[(&str, &str, &str, &str, &str)]) -> MemoryTable {
    let columns = ["ID", "AMOUNT", "STATUS", "NOTE", "UPDATED_TS"]
        .iter()
        .map(|name| Column::untyped(*name))
        .collect();
    rows.iter()
        .try_fold(MemoryTable::new("prices", columns), |table, row| {
            table.with_row(vec![
                Some(Value::from(row.0)),
                Some(Value::from(row.1)),
                Some(Value::from(row.2)),
                Some(Value::from(row.3)),
                Some(Value::from(row.4)),
            ])
        })
        .expect("build table")
}

#[test]
fn configured_comparators_absorb_tolerated_differences() {
    let assertion = CompareConfig::from_yaml_str(CONFIG)
        .and_then(|config| config.assertion())
        .expect("config");
    let expected = prices(&[("1", "10.00", "open", "a", "09:00")]);
    let actual = prices(&[("1", "10.04", "OPEN", "b", "10:00")]);
    assertion
        .assert_tables(&expected, &actual)
        .expect("differences are tolerated");
}

#[test]
fn out_of_tolerance_value_carries_additional_info() {
    let assertion = CompareConfig::from_yaml_str(CONFIG)
        .and_then(|config| config.assertion())
        .expect("config");
    let expected = prices(&[("7", "10.00", "open", "a", "09:00")]);
    let actual = prices(&[("7", "10.10", "open", "a", "09:00")]);
    let failures = assertion
        .collect_tables(&expected, &actual)
        .expect("comparison runs");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].message.starts_with(
        "value (table=prices, row=0, col=AMOUNT, Additional row info: ('ID': expected=<7>, actual=<7>))"
    ));
    assert!(failures[0].message.contains("is not within tolerance 0.05 of"));
}

#[test]
fn strict_row_count_rejects_uncountable_tables() {
    struct Streaming(MemoryTable);

    impl Table for Streaming {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn columns(&self) -> &[Column] {
            self.0.columns()
        }
        fn row_count(&self) -> Option<usize> {
            None
        }
        fn value(&self, row: usize, column: &str) -> csv_assert::error::Result<Option<Value>> {
            self.0.value(row, column)
        }
    }

    let config = CompareConfig::from_yaml_str("row_count: strict").expect("config");
    assert_eq!(config.row_count, RowCountPolicy::Strict);
    let table = prices(&[("1", "1", "x", "y", "z")]);
    let err = config
        .assertion()
        .expect("assertion")
        .collect_tables(&Streaming(table.clone()), &table)
        .expect_err("row count is required");
    assert!(matches!(err, AssertError::NotComparable { .. }));
}

#[test]
fn config_file_and_typed_csv_work_together() {
    let workspace = TestWorkspace::new();
    let config_path = workspace.write(
        "compare.yaml",
        "tables:\n  readings:\n    default: { timestamp_tolerance_ms: 1000 }\n    columns:\n      VALUE: equal\n",
    );
    workspace.write(
        "expected/readings.schema.yaml",
        "columns:\n  - name: at\n    datatype: datetime\n  - name: value\n    datatype: integer\n",
    );
    workspace.write(
        "expected/readings.csv",
        "at,value\n2024-01-01 10:00:00,5\n",
    );
    workspace.write(
        "actual/readings.csv",
        "at,value\n2024-01-01 10:00:00.500,5\n",
    );

    let assertion = CompareConfig::load(&config_path)
        .and_then(|config| config.assertion())
        .expect("config");
    let expected = load_table(
        &workspace.path().join("expected/readings.csv"),
        &CsvOptions::default(),
    )
    .expect("expected table");
    let actual = load_table(
        &workspace.path().join("actual/readings.csv"),
        &CsvOptions::default(),
    )
    .expect("actual table");
    assertion
        .assert_tables(&expected, &actual)
        .expect("half a second is within tolerance");
}
