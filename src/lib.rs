//! airtable_sync library: Airtable to warehouse sync
//!
//! This library moves table data between Airtable and a SQL warehouse in both
//! directions:
//!
//! - **load** reads every record of one Airtable table and replaces a
//!   warehouse table with it, deriving column types from Airtable's field
//!   types (and from the values themselves for computed fields)
//! - **send** reads warehouse tables and creates or updates Airtable records
//!   from their rows, in batches of at most ten
//!
//! # Example
//!
//! ```no_run
//! use airtable_sync::{run_load, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     api_key: std::env::var("AIRTABLE_API_KEY")?,
//!     ..Default::default()
//! };
//!
//! let summary = run_load(&config, "sqlite:./warehouse.db", "appXXXXXXXXXXXXXX", "Contacts", "raw.contacts").await?;
//! println!("Loaded {} rows into {}", summary.rows_loaded, summary.destination);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

mod app;
pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod load;
pub mod mapping;
pub mod remote;
pub mod send;
pub mod warehouse;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel, Opt, SyncFileConfig, SyncTableConfig};
pub use error_handling::SyncError;
pub use load::{LoadPipeline, LoadSummary};
pub use run::{run_load, run_send};
pub use send::{SendPipeline, SendSummary};

// Entry points used by the binary
mod run {
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::info;

    use crate::app::{print_load_statistics, print_send_statistics};
    use crate::config::{Config, SyncFileConfig};
    use crate::initialization::*;
    use crate::load::{LoadPipeline, LoadSummary};
    use crate::mapping::TypeMapper;
    use crate::remote::RemoteClient;
    use crate::send::{SendPipeline, SendSummary};
    use crate::warehouse::{QualifiedName, SqliteWarehouse, Warehouse};

    async fn init_pipeline_parts(
        config: &Config,
        warehouse_url: &str,
    ) -> Result<(RemoteClient, Arc<dyn Warehouse>)> {
        let throttle = init_rate_limiter(config.rate_limit_rps);
        let client =
            RemoteClient::new(config, throttle).context("Failed to initialize Airtable client")?;
        let pool = init_sqlite_pool(warehouse_url)
            .await
            .context("Failed to initialize warehouse pool")?;
        Ok((client, Arc::new(SqliteWarehouse::new(pool))))
    }

    /// Replaces `destination` with every record of Airtable table `table`.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - `destination` is not a valid table name
    /// - The HTTP client or warehouse pool cannot be initialized
    /// - The load itself fails (see [`LoadPipeline::load`])
    pub async fn run_load(
        config: &Config,
        warehouse_url: &str,
        base: &str,
        table: &str,
        destination: &str,
    ) -> Result<LoadSummary> {
        let start = Instant::now();
        let destination = QualifiedName::parse(destination).context("Invalid destination")?;
        let (client, warehouse) = init_pipeline_parts(config, warehouse_url).await?;

        let pipeline = LoadPipeline::new(client, warehouse, TypeMapper::new(config.sample_size));
        let summary = pipeline
            .load(base, table, &destination)
            .await
            .with_context(|| format!("Failed to load {table} into {destination}"))?;

        print_load_statistics(&summary, start.elapsed().as_secs_f64());
        Ok(summary)
    }

    /// Sends the warehouse tables listed in `sync` to Airtable.
    ///
    /// Row and request failures are counted in the returned summary; only
    /// configuration, schema and setup failures are errors.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The HTTP client or warehouse pool cannot be initialized
    /// - An update table is missing or has no `id` column
    /// - The Airtable table cannot be found
    pub async fn run_send(
        config: &Config,
        warehouse_url: &str,
        sync: &SyncFileConfig,
    ) -> Result<SendSummary> {
        let start = Instant::now();
        info!(
            "Sending {} table(s) to {}/{}",
            sync.tables.len(),
            sync.base_id,
            sync.table_name
        );
        let (client, warehouse) = init_pipeline_parts(config, warehouse_url).await?;

        let pipeline = SendPipeline::new(
            client,
            warehouse,
            TypeMapper::new(config.sample_size),
            config.max_batch,
        );
        let summary = pipeline
            .send(&sync.base_id, &sync.table_name, &sync.tables)
            .await
            .with_context(|| format!("Failed to send to {}", sync.table_name))?;

        print_send_statistics(&summary, start.elapsed().as_secs_f64());
        Ok(summary)
    }
}
