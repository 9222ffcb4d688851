//! SQLite-backed warehouse.
//!
//! SQLite has no schemas, so `schema.table` is stored as a single table whose
//! quoted identifier is `"schema.table"`; the database part of a qualified
//! name is ignored. Declared column types use the warehouse type names and are
//! read back with `PRAGMA table_info`.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

use super::types::{
    parse_date, parse_timestamp, QualifiedName, WarehouseColumn, WarehouseColumnType,
    WarehouseTable, WarehouseValue,
};
use super::Warehouse;
use crate::config::{MAX_BIND_PARAMETERS, STAGING_TABLE_SUFFIX};
use crate::error_handling::WarehouseError;

/// Warehouse stored in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteWarehouse {
    pool: SqlitePool,
}

impl SqliteWarehouse {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn table_identifier(name: &QualifiedName) -> String {
    format!("{}.{}", name.schema, name.table)
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn describe(
        &self,
        table: &QualifiedName,
    ) -> Result<Option<Vec<WarehouseColumn>>, WarehouseError> {
        let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table_identifier(table))
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            let column_type = WarehouseColumnType::from_sql_type(&declared).unwrap_or_else(|| {
                log::debug!("Column {name} of {table} has type '{declared}', reading as text");
                WarehouseColumnType::Text
            });
            columns.push(WarehouseColumn { name, column_type });
        }
        Ok(Some(columns))
    }

    async fn read_table(&self, table: &QualifiedName) -> Result<WarehouseTable, WarehouseError> {
        let columns = self
            .describe(table)
            .await?
            .ok_or_else(|| WarehouseError::TableNotFound(table.to_string()))?;

        let select = format!(
            "SELECT {} FROM {}",
            columns
                .iter()
                .map(|c| quote(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            quote(&table_identifier(table))
        );
        let rows = sqlx::query(&select).fetch_all(&self.pool).await?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                values.push(decode_cell(row, i, column.column_type)?);
            }
            decoded.push(values);
        }
        log::debug!("Read {} rows from {table}", decoded.len());
        Ok(WarehouseTable {
            columns,
            rows: decoded,
        })
    }

    async fn replace_table(
        &self,
        table: &QualifiedName,
        columns: &[WarehouseColumn],
        rows: &[Vec<WarehouseValue>],
    ) -> Result<usize, WarehouseError> {
        if columns.is_empty() {
            return Err(WarehouseError::Destination(format!(
                "Refusing to create {table} without columns"
            )));
        }
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(WarehouseError::Destination(format!(
                "Row has {} values for {} columns of {table}",
                row.len(),
                columns.len()
            )));
        }

        let target = quote(&table_identifier(table));
        let staging_name = format!("{}{STAGING_TABLE_SUFFIX}", table_identifier(table));
        let staging = quote(&staging_name);
        let column_list = columns
            .iter()
            .map(|c| quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let column_defs = columns
            .iter()
            .map(|c| format!("{} {}", quote(&c.name), c.column_type.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {staging}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {staging} ({column_defs})"))
            .execute(&mut *tx)
            .await?;

        let rows_per_insert = (MAX_BIND_PARAMETERS / columns.len()).max(1);
        for chunk in rows.chunks(rows_per_insert) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO {staging} ({column_list}) "));
            builder.push_values(chunk, |mut b, row| {
                for value in row {
                    match value {
                        WarehouseValue::Null => {
                            b.push_bind(None::<String>);
                        }
                        WarehouseValue::Integer(i) => {
                            b.push_bind(*i);
                        }
                        WarehouseValue::Number(n) => {
                            b.push_bind(*n);
                        }
                        WarehouseValue::Boolean(v) => {
                            b.push_bind(*v);
                        }
                        other => {
                            b.push_bind(other.to_text());
                        }
                    }
                }
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query(&format!("DROP TABLE IF EXISTS {target}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("ALTER TABLE {staging} RENAME TO {target}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::debug!("Replaced {table} with {} rows", rows.len());
        Ok(rows.len())
    }
}

/// Decodes one cell by its storage class, then coerces it toward the
/// column's declared type. Values that do not fit the declared type are kept
/// in their stored form.
fn decode_cell(
    row: &SqliteRow,
    index: usize,
    column_type: WarehouseColumnType,
) -> Result<WarehouseValue, WarehouseError> {
    let raw: SqliteValueRef = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(WarehouseValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" => {
            let i: i64 = row.try_get(index)?;
            match column_type {
                WarehouseColumnType::Boolean => WarehouseValue::Boolean(i != 0),
                _ => WarehouseValue::Integer(i),
            }
        }
        "REAL" => WarehouseValue::Number(row.try_get(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            coerce_text(String::from_utf8_lossy(&bytes).into_owned(), column_type)
        }
        _ => coerce_text(row.try_get(index)?, column_type),
    };
    Ok(value)
}

fn coerce_text(text: String, column_type: WarehouseColumnType) -> WarehouseValue {
    let coerced = match column_type {
        WarehouseColumnType::Text | WarehouseColumnType::LargeText => None,
        WarehouseColumnType::Number => text.trim().parse::<f64>().ok().map(WarehouseValue::Number),
        WarehouseColumnType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(WarehouseValue::Boolean(true)),
            "false" => Some(WarehouseValue::Boolean(false)),
            _ => None,
        },
        WarehouseColumnType::Date => parse_date(&text).map(WarehouseValue::Date),
        WarehouseColumnType::Timestamp => parse_timestamp(&text).map(WarehouseValue::Timestamp),
        WarehouseColumnType::TextArray => serde_json::from_str::<Vec<String>>(&text)
            .ok()
            .map(WarehouseValue::TextArray),
        WarehouseColumnType::Json => serde_json::from_str(&text).ok().map(WarehouseValue::Json),
    };
    coerced.unwrap_or(WarehouseValue::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::init_sqlite_pool;
    use chrono::NaiveDate;
    use serde_json::json;

    async fn warehouse() -> SqliteWarehouse {
        SqliteWarehouse::new(
            init_sqlite_pool("sqlite::memory:")
                .await
                .expect("memory pool"),
        )
    }

    fn name() -> QualifiedName {
        QualifiedName::parse("analytics.raw.contacts").expect("valid name")
    }

    #[tokio::test]
    async fn test_describe_missing_table() {
        let warehouse = warehouse().await;
        assert_eq!(warehouse.describe(&name()).await.expect("describe"), None);
    }

    #[tokio::test]
    async fn test_replace_then_read_preserves_types() {
        let warehouse = warehouse().await;
        let columns = vec![
            WarehouseColumn::new("name", WarehouseColumnType::Text),
            WarehouseColumn::new("score", WarehouseColumnType::Number),
            WarehouseColumn::new("active", WarehouseColumnType::Boolean),
            WarehouseColumn::new("joined", WarehouseColumnType::Date),
            WarehouseColumn::new("tags", WarehouseColumnType::TextArray),
            WarehouseColumn::new("meta", WarehouseColumnType::Json),
        ];
        let joined = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");
        let rows = vec![
            vec![
                WarehouseValue::Text("Ada".to_string()),
                WarehouseValue::Number(1.5),
                WarehouseValue::Boolean(true),
                WarehouseValue::Date(joined),
                WarehouseValue::TextArray(vec!["a".to_string(), "b".to_string()]),
                WarehouseValue::Json(json!({"k": 1})),
            ],
            vec![
                WarehouseValue::Null,
                WarehouseValue::Integer(3),
                WarehouseValue::Boolean(false),
                WarehouseValue::Null,
                WarehouseValue::Null,
                WarehouseValue::Null,
            ],
        ];

        let written = warehouse
            .replace_table(&name(), &columns, &rows)
            .await
            .expect("replace");
        assert_eq!(written, 2);

        let described = warehouse
            .describe(&name())
            .await
            .expect("describe")
            .expect("table exists");
        assert_eq!(described, columns);

        let table = warehouse.read_table(&name()).await.expect("read");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], rows[0]);
        assert_eq!(table.rows[1][1], WarehouseValue::Integer(3));
        assert_eq!(table.rows[1][2], WarehouseValue::Boolean(false));
        assert!(table.rows[1][0].is_null());
    }

    #[tokio::test]
    async fn test_replace_drops_previous_contents_and_staging() {
        let warehouse = warehouse().await;
        let columns = vec![WarehouseColumn::new("x", WarehouseColumnType::Text)];
        let first = vec![vec![WarehouseValue::Text("old".to_string())]; 3];
        warehouse
            .replace_table(&name(), &columns, &first)
            .await
            .expect("first replace");

        let columns = vec![WarehouseColumn::new("y", WarehouseColumnType::Number)];
        let second = vec![vec![WarehouseValue::Integer(1)]];
        warehouse
            .replace_table(&name(), &columns, &second)
            .await
            .expect("second replace");

        let table = warehouse.read_table(&name()).await.expect("read");
        assert_eq!(table.columns, columns);
        assert_eq!(table.rows, second);

        let staging: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE name LIKE '%__loader_tmp'",
        )
        .fetch_one(warehouse.pool())
        .await
        .expect("count");
        assert_eq!(staging, 0);
    }

    #[tokio::test]
    async fn test_replace_many_rows_in_chunks() {
        let warehouse = warehouse().await;
        let columns: Vec<WarehouseColumn> = (0..4)
            .map(|i| WarehouseColumn::new(format!("c{i}"), WarehouseColumnType::Number))
            .collect();
        let rows: Vec<Vec<WarehouseValue>> = (0..10_000)
            .map(|i| (0..4).map(|_| WarehouseValue::Integer(i)).collect())
            .collect();
        let written = warehouse
            .replace_table(&name(), &columns, &rows)
            .await
            .expect("replace");
        assert_eq!(written, 10_000);
        let table = warehouse.read_table(&name()).await.expect("read");
        assert_eq!(table.rows.len(), 10_000);
    }

    #[tokio::test]
    async fn test_replace_rejects_ragged_rows() {
        let warehouse = warehouse().await;
        let columns = vec![WarehouseColumn::new("x", WarehouseColumnType::Text)];
        let rows = vec![vec![WarehouseValue::Null, WarehouseValue::Null]];
        assert!(matches!(
            warehouse.replace_table(&name(), &columns, &rows).await,
            Err(WarehouseError::Destination(_))
        ));
    }

    #[tokio::test]
    async fn test_read_hand_made_table() {
        let warehouse = warehouse().await;
        sqlx::query(
            r#"CREATE TABLE "marts.updates" (id TEXT, amount INTEGER, done BOOLEAN, due DATE)"#,
        )
        .execute(warehouse.pool())
        .await
        .expect("create");
        sqlx::query(r#"INSERT INTO "marts.updates" VALUES ('rec1', 42, 1, '2024-01-31'), ('rec2', NULL, 'yes', 'soon')"#)
            .execute(warehouse.pool())
            .await
            .expect("insert");

        let table = warehouse
            .read_table(&QualifiedName::parse("marts.updates").expect("valid"))
            .await
            .expect("read");
        assert_eq!(table.columns[0].column_type, WarehouseColumnType::LargeText);
        assert_eq!(table.rows[0][1], WarehouseValue::Integer(42));
        assert_eq!(table.rows[0][2], WarehouseValue::Boolean(true));
        assert_eq!(
            table.rows[0][3],
            WarehouseValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid"))
        );
        assert_eq!(table.rows[1][2], WarehouseValue::Text("yes".to_string()));
        assert_eq!(table.rows[1][3], WarehouseValue::Text("soon".to_string()));
    }

    #[tokio::test]
    async fn test_read_missing_table() {
        let warehouse = warehouse().await;
        assert!(matches!(
            warehouse.read_table(&name()).await,
            Err(WarehouseError::TableNotFound(_))
        ));
    }
}
