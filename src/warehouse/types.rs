//! Warehouse column types, values and table names.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use strum_macros::EnumIter;

use crate::error_handling::ConfigError;

/// Column type of a warehouse table.
///
/// Names follow Snowflake's dialect, which SQLite accepts verbatim as declared
/// column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum WarehouseColumnType {
    Text,
    LargeText,
    Number,
    Boolean,
    Date,
    Timestamp,
    TextArray,
    Json,
}

impl WarehouseColumnType {
    /// Declared SQL type.
    pub fn sql_type(&self) -> &'static str {
        match self {
            WarehouseColumnType::Text => "VARCHAR",
            WarehouseColumnType::LargeText => "TEXT",
            WarehouseColumnType::Number => "NUMBER(38,6)",
            WarehouseColumnType::Boolean => "BOOLEAN",
            WarehouseColumnType::Date => "DATE",
            WarehouseColumnType::Timestamp => "TIMESTAMP_NTZ",
            WarehouseColumnType::TextArray => "ARRAY",
            WarehouseColumnType::Json => "VARIANT",
        }
    }

    /// Parses a declared SQL type, including common synonyms.
    ///
    /// Returns `None` for types outside the known set.
    pub fn from_sql_type(declared: &str) -> Option<Self> {
        let upper = declared.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        let column_type = match base {
            "VARCHAR" | "CHAR" | "CHARACTER" | "NVARCHAR" | "STRING" => WarehouseColumnType::Text,
            "TEXT" | "CLOB" => WarehouseColumnType::LargeText,
            "NUMBER" | "NUMERIC" | "DECIMAL" | "INT" | "INTEGER" | "BIGINT" | "SMALLINT"
            | "TINYINT" | "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => {
                WarehouseColumnType::Number
            }
            "BOOLEAN" | "BOOL" => WarehouseColumnType::Boolean,
            "DATE" => WarehouseColumnType::Date,
            "TIMESTAMP" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" | "DATETIME" => {
                WarehouseColumnType::Timestamp
            }
            "ARRAY" => WarehouseColumnType::TextArray,
            "VARIANT" | "OBJECT" | "JSON" => WarehouseColumnType::Json,
            _ => return None,
        };
        Some(column_type)
    }
}

impl fmt::Display for WarehouseColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// A single warehouse cell.
#[derive(Debug, Clone, PartialEq)]
pub enum WarehouseValue {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    Json(Value),
}

impl WarehouseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, WarehouseValue::Null)
    }

    /// Text rendering used when the value lands in a text column or field.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            WarehouseValue::Null => return None,
            WarehouseValue::Text(s) => s.clone(),
            WarehouseValue::Integer(i) => i.to_string(),
            WarehouseValue::Number(n) => n.to_string(),
            WarehouseValue::Boolean(b) => b.to_string(),
            WarehouseValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            WarehouseValue::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            WarehouseValue::TextArray(items) => Value::from(items.clone()).to_string(),
            WarehouseValue::Json(v) => v.to_string(),
        };
        Some(text)
    }
}

impl fmt::Display for WarehouseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

/// Parses a calendar date written as `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Parses a timestamp: RFC 3339, or a naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseColumn {
    pub name: String,
    pub column_type: WarehouseColumnType,
}

impl WarehouseColumn {
    pub fn new(name: impl Into<String>, column_type: WarehouseColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Columns and rows of a warehouse table; every row has one value per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseTable {
    pub columns: Vec<WarehouseColumn>,
    pub rows: Vec<Vec<WarehouseValue>>,
}

impl WarehouseTable {
    /// Position of the column named `name`, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// `database.schema.table` or `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub database: Option<String>,
    pub schema: String,
    pub table: String,
}

impl QualifiedName {
    /// Parses a dotted table name.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidTableName` unless the name has two or three
    /// non-empty parts.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = name.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::InvalidTableName(name.to_string()));
        }
        match parts.as_slice() {
            [schema, table] => Ok(Self {
                database: None,
                schema: schema.to_string(),
                table: table.to_string(),
            }),
            [database, schema, table] => Ok(Self {
                database: Some(database.to_string()),
                schema: schema.to_string(),
                table: table.to_string(),
            }),
            _ => Err(ConfigError::InvalidTableName(name.to_string())),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "{database}.")?;
        }
        write!(f, "{}.{}", self.schema, self.table)
    }
}
