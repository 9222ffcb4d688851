//! Warehouse access.
//!
//! The pipelines talk to the warehouse through the [`Warehouse`] trait. The
//! bundled implementation stores tables in SQLite.

mod pool;
mod sqlite;
mod types;

use async_trait::async_trait;

use crate::error_handling::WarehouseError;

// Re-export public API
pub use pool::init_sqlite_pool;
pub use sqlite::SqliteWarehouse;
pub use types::{
    parse_date, parse_timestamp, QualifiedName, WarehouseColumn, WarehouseColumnType,
    WarehouseTable, WarehouseValue,
};

/// Table storage used by the load and send pipelines.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Columns of `table`, or `None` if it does not exist.
    async fn describe(
        &self,
        table: &QualifiedName,
    ) -> Result<Option<Vec<WarehouseColumn>>, WarehouseError>;

    /// Every row of `table`.
    async fn read_table(&self, table: &QualifiedName) -> Result<WarehouseTable, WarehouseError>;

    /// Atomically replaces `table` (schema and contents) with `rows`.
    ///
    /// Readers see either the previous table or the new one, never a mix.
    /// Returns the number of rows written.
    async fn replace_table(
        &self,
        table: &QualifiedName,
        columns: &[WarehouseColumn],
        rows: &[Vec<WarehouseValue>],
    ) -> Result<usize, WarehouseError>;
}
