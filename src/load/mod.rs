//! Airtable to warehouse load.
//!
//! A load fetches the field list and every record of one table, derives the
//! destination columns (inferring computed field types from the records it
//! just read), and replaces the destination table in one transaction.

use std::collections::HashSet;
use std::sync::Arc;

use futures::TryStreamExt;
use log::{debug, info, warn};

use crate::config::ITERATOR_RESTART_LIMIT;
use crate::error_handling::{RemoteError, SyncError};
use crate::mapping::{normalize_column_name, TypeMapper};
use crate::remote::{RecordPage, RemoteClient, RemoteField, RemoteFieldType, RemoteRecord};
use crate::warehouse::{
    QualifiedName, Warehouse, WarehouseColumn, WarehouseColumnType, WarehouseValue,
};

/// Column holding the Airtable record id.
pub const ID_COLUMN: &str = "id";
/// Column holding the record's creation time.
pub const CREATED_TIME_COLUMN: &str = "created_time";

/// Outcome of one load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub destination: String,
    pub rows_loaded: usize,
    pub columns: Vec<WarehouseColumn>,
    /// Records left out because they were malformed or a value did not fit a
    /// declared column.
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Destination column for one remote field.
#[derive(Debug)]
struct FieldColumn<'a> {
    field: &'a RemoteField,
    column_type: WarehouseColumnType,
}

/// Loads Airtable tables into the warehouse.
pub struct LoadPipeline {
    client: RemoteClient,
    warehouse: Arc<dyn Warehouse>,
    mapper: TypeMapper,
}

impl LoadPipeline {
    pub fn new(client: RemoteClient, warehouse: Arc<dyn Warehouse>, mapper: TypeMapper) -> Self {
        Self {
            client,
            warehouse,
            mapper,
        }
    }

    /// Replaces `destination` with the current contents of `base`/`table`.
    ///
    /// # Errors
    ///
    /// - `SyncError::Schema` if the table is missing, has no fields, or two
    ///   fields normalize to the same column name
    /// - `SyncError::Remote` if fetching fails after retries
    /// - `SyncError::Destination` if the warehouse rejects the write
    pub async fn load(
        &self,
        base: &str,
        table: &str,
        destination: &QualifiedName,
    ) -> Result<LoadSummary, SyncError> {
        info!("Loading {base}/{table} into {destination}");
        let fields = self.client.list_fields(base, table).await?;
        if fields.is_empty() {
            return Err(SyncError::Schema(format!("Table {table} has no fields")));
        }
        debug!("{table} has {} fields", fields.len());

        let mut warnings = Vec::new();
        let (records, malformed) = self.fetch_all(base, table).await?;
        let mut skipped = malformed.len();
        for entry in malformed {
            let message = format!("Skipped malformed record: {entry}");
            warn!("{message}");
            warnings.push(message);
        }

        let field_columns = self.field_columns(&fields, &records, &mut warnings)?;
        let with_created_time = records.iter().any(|r| r.created_time.is_some());

        let mut columns = vec![WarehouseColumn::new(ID_COLUMN, WarehouseColumnType::Text)];
        if with_created_time {
            columns.push(WarehouseColumn::new(
                CREATED_TIME_COLUMN,
                WarehouseColumnType::Timestamp,
            ));
        }
        columns.extend(field_columns.iter().map(|fc| {
            WarehouseColumn::new(normalize_column_name(&fc.field.name), fc.column_type)
        }));

        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            match self.record_row(record, &field_columns, with_created_time, &mut warnings) {
                Ok(row) => rows.push(row),
                Err(message) => {
                    warn!("{message}");
                    warnings.push(message);
                    skipped += 1;
                }
            }
        }

        let rows_loaded = self
            .warehouse
            .replace_table(destination, &columns, &rows)
            .await?;

        let summary = LoadSummary {
            destination: destination.to_string(),
            rows_loaded,
            columns,
            skipped,
            warnings,
        };
        info!(
            "Loaded {} rows into {} ({} skipped)",
            summary.rows_loaded, summary.destination, summary.skipped
        );
        Ok(summary)
    }

    /// Reads every record, restarting the listing when Airtable expires it.
    async fn fetch_all(
        &self,
        base: &str,
        table: &str,
    ) -> Result<(Vec<RemoteRecord>, Vec<String>), SyncError> {
        let mut restarts = 0;
        loop {
            let pages: Result<Vec<RecordPage>, RemoteError> =
                self.client.list_pages(base, table).try_collect().await;
            match pages {
                Ok(pages) => {
                    let mut records = Vec::new();
                    let mut malformed = Vec::new();
                    for page in pages {
                        records.extend(page.records);
                        malformed.extend(page.malformed);
                    }
                    debug!("Fetched {} records from {table}", records.len());
                    return Ok((records, malformed));
                }
                Err(RemoteError::IteratorExpired) if restarts < ITERATOR_RESTART_LIMIT => {
                    restarts += 1;
                    warn!(
                        "Listing of {table} expired, restarting ({restarts}/{ITERATOR_RESTART_LIMIT})"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn field_columns<'a>(
        &self,
        fields: &'a [RemoteField],
        records: &[RemoteRecord],
        warnings: &mut Vec<String>,
    ) -> Result<Vec<FieldColumn<'a>>, SyncError> {
        let mut seen: HashSet<String> = [ID_COLUMN, CREATED_TIME_COLUMN]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut columns = Vec::with_capacity(fields.len());
        for field in fields {
            let name = normalize_column_name(&field.name);
            if name.is_empty() {
                return Err(SyncError::Schema(format!(
                    "Field '{}' has no usable characters for a column name",
                    field.name
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(SyncError::Schema(format!(
                    "Field '{}' collides with another column named '{name}'",
                    field.name
                )));
            }
            if let Some(message) = TypeMapper::unrecognized_type_warning(field) {
                warn!("{message}");
                warnings.push(message);
            }
            let samples = records.iter().filter_map(|r| r.fields.get(&field.name));
            let column_type = self.mapper.remote_to_warehouse_type(field, samples);
            debug!("Field '{}' ({}) -> {name} {column_type}", field.name, field.field_type);
            columns.push(FieldColumn { field, column_type });
        }
        Ok(columns)
    }

    /// Converts one record into a row.
    ///
    /// A value that does not fit a declared column skips the record. Computed
    /// columns are typed from a sample, so a later value that does not fit is
    /// stored as NULL with a warning instead.
    fn record_row(
        &self,
        record: &RemoteRecord,
        field_columns: &[FieldColumn<'_>],
        with_created_time: bool,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<WarehouseValue>, String> {
        let mut row = Vec::with_capacity(field_columns.len() + 2);
        row.push(WarehouseValue::Text(record.id.clone()));
        if with_created_time {
            row.push(
                record
                    .created_time
                    .map(WarehouseValue::Timestamp)
                    .unwrap_or(WarehouseValue::Null),
            );
        }
        for fc in field_columns {
            let value = match record.fields.get(&fc.field.name) {
                Some(value) => match self.mapper.to_warehouse_value(fc.column_type, value) {
                    Ok(converted) => converted,
                    Err(e) if fc.field.field_type.is_inferred() => {
                        let message = format!(
                            "Record {}: field '{}' stored as NULL: {e}",
                            record.id, fc.field.name
                        );
                        warn!("{message}");
                        warnings.push(message);
                        WarehouseValue::Null
                    }
                    Err(e) => {
                        return Err(format!(
                            "Skipped record {}: field '{}': {e}",
                            record.id, fc.field.name
                        ));
                    }
                },
                // Airtable leaves unchecked checkboxes out of the record.
                None if fc.field.field_type == RemoteFieldType::Checkbox => {
                    WarehouseValue::Boolean(false)
                }
                None => WarehouseValue::Null,
            };
            row.push(value);
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FieldValue;

    fn record(id: &str, fields: Vec<(&str, FieldValue)>) -> RemoteRecord {
        RemoteRecord {
            id: id.to_string(),
            created_time: None,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    // Never reaches the network or the database.
    fn pipeline() -> LoadPipeline {
        use crate::config::Config;
        use crate::initialization::Unthrottled;
        use crate::warehouse::SqliteWarehouse;

        let config = Config {
            api_key: "patTEST".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let client = RemoteClient::new(&config, Arc::new(Unthrottled)).expect("client");
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy("sqlite::memory:")
            .expect("lazy pool");
        LoadPipeline::new(client, Arc::new(SqliteWarehouse::new(pool)), TypeMapper::default())
    }

    #[tokio::test]
    async fn test_colliding_field_names_are_schema_errors() {
        let pipeline = pipeline();
        let fields = vec![
            RemoteField::new("First Name", RemoteFieldType::SingleLineText),
            RemoteField::new("first_name", RemoteFieldType::SingleLineText),
        ];
        let result = pipeline.field_columns(&fields, &[], &mut Vec::new());
        assert!(matches!(result, Err(SyncError::Schema(_))));
    }

    #[tokio::test]
    async fn test_field_named_id_collides_with_audit_column() {
        let pipeline = pipeline();
        let fields = vec![RemoteField::new("ID", RemoteFieldType::Number)];
        let result = pipeline.field_columns(&fields, &[], &mut Vec::new());
        assert!(matches!(result, Err(SyncError::Schema(_))));
    }

    #[tokio::test]
    async fn test_unrecognized_types_are_warned() {
        let pipeline = pipeline();
        let fields = vec![RemoteField::from_api("Code", Some("barcode"), vec![])];
        let mut warnings = Vec::new();
        let columns = pipeline
            .field_columns(&fields, &[], &mut warnings)
            .expect("columns");
        assert_eq!(columns[0].column_type, WarehouseColumnType::Text);
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_record_row_skips_bad_values_and_defaults_checkboxes() {
        let pipeline = pipeline();
        let fields = vec![
            RemoteField::new("Amount", RemoteFieldType::Number),
            RemoteField::new("Done", RemoteFieldType::Checkbox),
        ];
        let columns = pipeline
            .field_columns(&fields, &[], &mut Vec::new())
            .expect("columns");

        let good = record("rec1", vec![("Amount", FieldValue::Number(2.0))]);
        assert_eq!(
            pipeline.record_row(&good, &columns, false, &mut Vec::new()),
            Ok(vec![
                WarehouseValue::Text("rec1".to_string()),
                WarehouseValue::Number(2.0),
                WarehouseValue::Boolean(false),
            ])
        );

        let bad = record("rec2", vec![("Amount", FieldValue::Text("lots".to_string()))]);
        let message = pipeline
            .record_row(&bad, &columns, false, &mut Vec::new())
            .expect_err("should be skipped");
        assert!(message.contains("rec2"));
        assert!(message.contains("Amount"));
    }

    #[tokio::test]
    async fn test_record_row_nulls_unfitting_computed_values() {
        let pipeline = pipeline();
        let fields = vec![
            RemoteField::new("Name", RemoteFieldType::SingleLineText),
            RemoteField::new("Score", RemoteFieldType::Formula),
        ];
        let samples = vec![record("rec1", vec![("Score", FieldValue::Number(1.0))])];
        let columns = pipeline
            .field_columns(&fields, &samples, &mut Vec::new())
            .expect("columns");
        assert_eq!(columns[1].column_type, WarehouseColumnType::Number);

        let errored = record(
            "rec2",
            vec![
                ("Name", FieldValue::Text("Ada".to_string())),
                ("Score", FieldValue::Text("#ERROR!".to_string())),
            ],
        );
        let mut warnings = Vec::new();
        let row = pipeline
            .record_row(&errored, &columns, false, &mut warnings)
            .expect("record is kept");
        assert_eq!(
            row,
            vec![
                WarehouseValue::Text("rec2".to_string()),
                WarehouseValue::Text("Ada".to_string()),
                WarehouseValue::Null,
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Score"));
    }
}
