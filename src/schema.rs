//! Column model and semantic datatypes.
//!
//! [`ColumnType`] is the semantic datatype used to interpret a cell when it is
//! compared. `Unknown` marks a column whose type the table provider could not
//! declare (for instance an untyped CSV file); the aligner resolves it against
//! the other side of the comparison.
//!
//! [`TableSchema`] is the optional YAML sidecar that gives CSV-backed tables
//! their datatypes and nullability.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Guid,
    Decimal,
    #[default]
    Unknown,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Guid => "guid",
            ColumnType::Decimal => "decimal",
            ColumnType::Unknown => "unknown",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string", "integer", "float", "boolean", "date", "datetime", "time", "guid", "decimal",
            "unknown",
        ]
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ColumnType::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Float | ColumnType::Decimal
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::DateTime | ColumnType::Time
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" | "varchar" => Ok(ColumnType::String),
            "integer" | "int" | "bigint" => Ok(ColumnType::Integer),
            "float" | "double" | "real" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            "time" => Ok(ColumnType::Time),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            "decimal" | "numeric" | "currency" => Ok(ColumnType::Decimal),
            "unknown" | "" => Ok(ColumnType::Unknown),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// Case-insensitive identity of a column or table name.
pub fn name_key(name: &str) -> String {
    name.to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub datatype: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
            nullable: true,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Unknown)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn key(&self) -> String {
        name_key(&self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.key() == name_key(name)
    }
}

/// Returns `columns` ordered by case-insensitive name. The sort is stable.
pub fn sorted_columns(columns: &[Column]) -> Vec<Column> {
    let mut sorted = columns.to_vec();
    sorted.sort_by_cached_key(Column::key);
    sorted
}

/// Renders column names the way structural diagnostics list them: `[A, B, C]`.
pub fn column_names_text(columns: &[Column]) -> String {
    let names = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
    format!("[{}]", names.join(", "))
}

/// YAML sidecar describing the columns of a CSV-backed table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.matches(name))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let schema = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing schema YAML {path:?}"))?;
        Ok(schema)
    }

    /// Resolves headers against the schema; headers the schema does not know stay `Unknown`.
    pub fn columns_for_headers(&self, headers: &[String]) -> Vec<Column> {
        headers
            .iter()
            .map(|header| match self.column(header) {
                Some(column) => Column {
                    name: header.clone(),
                    datatype: column.datatype,
                    nullable: column.nullable,
                },
                None => Column::untyped(header.clone()),
            })
            .collect()
    }
}
