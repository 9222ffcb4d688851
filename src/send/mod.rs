//! Warehouse to Airtable send.
//!
//! A send reads each configured warehouse table in turn and writes its rows
//! to one Airtable table, creating new records or updating the records named
//! by the table's `id` column. The warehouse is never written.

mod summary;

use std::sync::Arc;

use log::{debug, warn};

use crate::config::SyncTableConfig;
use crate::error_handling::{ConfigError, RemoteError, SyncError};
use crate::load::ID_COLUMN;
use crate::mapping::{column_matches_field, TypeMapper};
use crate::remote::{FieldMap, RecordUpdate, RemoteClient, RemoteField};
use crate::warehouse::{Warehouse, WarehouseTable, WarehouseValue};

// Re-export public API
pub use summary::{SendSummary, SyncMode, TableSummary};

/// Sends warehouse rows to Airtable.
pub struct SendPipeline {
    client: RemoteClient,
    warehouse: Arc<dyn Warehouse>,
    mapper: TypeMapper,
    max_batch: usize,
}

impl SendPipeline {
    pub fn new(
        client: RemoteClient,
        warehouse: Arc<dyn Warehouse>,
        mapper: TypeMapper,
        max_batch: usize,
    ) -> Self {
        Self {
            client,
            warehouse,
            mapper,
            max_batch,
        }
    }

    /// Sends every configured table to `base`/`table`, in order.
    ///
    /// Update tables are checked for an `id` column before anything is sent.
    /// After that, failures are counted per row, per request and per table;
    /// one table failing never stops the next.
    ///
    /// # Errors
    ///
    /// - `SyncError::Config` if an update table is missing or has no `id`
    /// - `SyncError::Schema` if the Airtable table cannot be found
    /// - `SyncError::Destination` if the warehouse cannot be inspected
    pub async fn send(
        &self,
        base: &str,
        table: &str,
        configs: &[SyncTableConfig],
    ) -> Result<SendSummary, SyncError> {
        self.validate(configs).await?;

        let fields = self.client.list_fields(base, table).await?;
        debug!("{table} has {} fields", fields.len());

        let mut summary = SendSummary::default();
        for config in configs {
            let table_summary = self.send_table(base, table, &fields, config).await;
            debug!(
                "{} ({}): {} read, {} succeeded, {} failed, {} skipped",
                table_summary.table,
                table_summary.mode,
                table_summary.rows_read,
                table_summary.succeeded,
                table_summary.failed,
                table_summary.skipped
            );
            summary.tables.push(table_summary);
        }

        debug!(
            "Send finished: {} created, {} updated, {} failed, {} skipped",
            summary.created(),
            summary.updated(),
            summary.failed(),
            summary.skipped()
        );
        Ok(summary)
    }

    async fn validate(&self, configs: &[SyncTableConfig]) -> Result<(), SyncError> {
        for config in configs.iter().filter(|c| c.update) {
            let columns = self
                .warehouse
                .describe(&config.table)
                .await?
                .ok_or_else(|| ConfigError::TableNotFound(config.table.to_string()))?;
            if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(ID_COLUMN)) {
                return Err(ConfigError::MissingIdColumn(config.table.to_string()).into());
            }
        }
        Ok(())
    }

    async fn send_table(
        &self,
        base: &str,
        table: &str,
        fields: &[RemoteField],
        config: &SyncTableConfig,
    ) -> TableSummary {
        let mode = if config.update {
            SyncMode::Update
        } else {
            SyncMode::Create
        };
        let mut summary = TableSummary::new(config.table.to_string(), mode);

        let data = match self.warehouse.read_table(&config.table).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read {}: {e}", config.table);
                summary.error = Some(e.to_string());
                return summary;
            }
        };
        summary.rows_read = data.rows.len();

        let id_index = data.column_index(ID_COLUMN);
        let targets = match_columns(&data, fields, id_index);

        match mode {
            SyncMode::Create => {
                let payloads = self.create_payloads(&data, &targets, &mut summary);
                self.create(base, table, &payloads, &mut summary).await;
            }
            SyncMode::Update => {
                let Some(id_index) = id_index else {
                    // Checked in validate; the table changed since.
                    let error = ConfigError::MissingIdColumn(summary.table.clone());
                    summary.error = Some(error.to_string());
                    return summary;
                };
                let updates = self.update_payloads(&data, &targets, id_index, &mut summary);
                self.update(base, table, &updates, &mut summary).await;
            }
        }
        summary
    }

    fn row_fields(
        &self,
        row: &[WarehouseValue],
        targets: &[(usize, &RemoteField)],
    ) -> Result<FieldMap, String> {
        let mut fields = FieldMap::new();
        for (index, field) in targets {
            match self.mapper.to_remote_value(field, &row[*index]) {
                Ok(Some(value)) => {
                    fields.insert(field.name.clone(), value);
                }
                Ok(None) => {}
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(fields)
    }

    fn create_payloads(
        &self,
        data: &WarehouseTable,
        targets: &[(usize, &RemoteField)],
        summary: &mut TableSummary,
    ) -> Vec<FieldMap> {
        let mut payloads = Vec::with_capacity(data.rows.len());
        for (row_number, row) in data.rows.iter().enumerate() {
            match self.row_fields(row, targets) {
                Ok(fields) => payloads.push(fields),
                Err(e) => {
                    warn!("Skipping row {row_number} of {}: {e}", summary.table);
                    summary.skipped += 1;
                }
            }
        }
        payloads
    }

    fn update_payloads(
        &self,
        data: &WarehouseTable,
        targets: &[(usize, &RemoteField)],
        id_index: usize,
        summary: &mut TableSummary,
    ) -> Vec<RecordUpdate> {
        let mut updates = Vec::with_capacity(data.rows.len());
        for (row_number, row) in data.rows.iter().enumerate() {
            let id = row[id_index]
                .to_text()
                .map(|id| id.trim().to_string())
                .unwrap_or_default();
            if id.is_empty() {
                let error = ConfigError::EmptyRecordId {
                    table: summary.table.clone(),
                    row: row_number,
                };
                warn!("{error}");
                summary.failed += 1;
                continue;
            }
            match self.row_fields(row, targets) {
                Ok(fields) => updates.push(RecordUpdate { id, fields }),
                Err(e) => {
                    warn!("Skipping row {row_number} ({id}) of {}: {e}", summary.table);
                    summary.skipped += 1;
                }
            }
        }
        updates
    }

    async fn create(
        &self,
        base: &str,
        table: &str,
        payloads: &[FieldMap],
        summary: &mut TableSummary,
    ) {
        for batch in self
            .client
            .create_records(base, table, payloads, self.max_batch)
            .await
        {
            match batch.result {
                Ok(records) => {
                    summary.succeeded += records.len();
                    summary.failed += batch.range.len().saturating_sub(records.len());
                    summary
                        .created_ids
                        .extend(records.into_iter().map(|r| r.id));
                }
                Err(_) => summary.failed += batch.range.len(),
            }
        }
    }

    async fn update(
        &self,
        base: &str,
        table: &str,
        updates: &[RecordUpdate],
        summary: &mut TableSummary,
    ) {
        for batch in self
            .client
            .update_records(base, table, updates, self.max_batch)
            .await
        {
            match batch.result {
                Ok(acknowledged) => {
                    summary.succeeded += acknowledged.min(batch.range.len());
                    summary.failed += batch.range.len().saturating_sub(acknowledged);
                }
                Err(RemoteError::RecordNotFound(message)) => {
                    debug!(
                        "Unknown record in updates {:?} ({message}), sending them one by one",
                        batch.range
                    );
                    for update in &updates[batch.range.clone()] {
                        let single = self
                            .client
                            .update_records(base, table, std::slice::from_ref(update), 1)
                            .await;
                        match single.into_iter().next().map(|b| b.result) {
                            Some(Ok(_)) => summary.succeeded += 1,
                            Some(Err(e)) => {
                                warn!("Update of {} failed: {e}", update.id);
                                summary.failed += 1;
                            }
                            None => summary.failed += 1,
                        }
                    }
                }
                Err(_) => summary.failed += batch.range.len(),
            }
        }
    }
}

/// Pairs warehouse column positions with the writable fields they feed.
///
/// The `id` column is never sent as a field. When two columns match one
/// field, the first wins.
fn match_columns<'a>(
    data: &WarehouseTable,
    fields: &'a [RemoteField],
    id_index: Option<usize>,
) -> Vec<(usize, &'a RemoteField)> {
    let mut targets: Vec<(usize, &RemoteField)> = Vec::new();
    let mut unmatched = Vec::new();
    for (index, column) in data.columns.iter().enumerate() {
        if Some(index) == id_index {
            continue;
        }
        let field = fields
            .iter()
            .find(|f| column_matches_field(&column.name, &f.name));
        match field {
            Some(field) if field.read_only => {
                debug!("Column {} feeds computed field '{}', ignoring", column.name, field.name);
            }
            Some(field) if targets.iter().any(|(_, f)| f.name == field.name) => {
                debug!("Column {} duplicates field '{}', ignoring", column.name, field.name);
            }
            Some(field) => targets.push((index, field)),
            None => unmatched.push(column.name.as_str()),
        }
    }
    if !unmatched.is_empty() {
        debug!("Columns without a matching field: {}", unmatched.join(", "));
    }
    targets
}
