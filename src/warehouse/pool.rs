//! Warehouse connection pool management.
//!
//! This module initializes the SQLite connection pool with:
//! - Automatic database file creation
//! - WAL mode enabled for file-backed databases
//! - A single long-lived connection for in-memory databases

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

use log::{error, info};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error_handling::WarehouseError;

/// Initializes the warehouse pool for a `sqlite:` URL.
///
/// `sqlite::memory:` opens a private in-memory database held by one
/// connection, so every query sees the same data. Any other `sqlite:` URL
/// names a file, created if missing.
///
/// # Errors
///
/// `WarehouseError::Destination` for non-SQLite URLs, `FileCreationError` if
/// the file cannot be created, and `SqlError` if connecting fails.
pub async fn init_sqlite_pool(url: &str) -> Result<SqlitePool, WarehouseError> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| {
            WarehouseError::Destination(format!("Unsupported warehouse URL: {url}"))
        })?;

    if path.is_empty() || path.starts_with(":memory:") {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        return Ok(pool);
    }

    let db_path = path.split('?').next().unwrap_or(path);
    create_database_file(Path::new(db_path))?;

    let pool = SqlitePool::connect(&format!("sqlite:{path}"))
        .await
        .map_err(|e| {
            error!("Failed to connect to warehouse: {e}");
            WarehouseError::SqlError(e)
        })?;

    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await
        .map_err(|e| {
            error!("Failed to set WAL mode: {e}");
            WarehouseError::SqlError(e)
        })?;

    Ok(pool)
}

fn create_database_file(path: &Path) -> Result<(), WarehouseError> {
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(_) => info!("Warehouse file {} created.", path.display()),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            info!("Warehouse file {} already exists.", path.display())
        }
        Err(e) => {
            error!("Failed to create warehouse file: {e}");
            return Err(WarehouseError::FileCreationError(e.to_string()));
        }
    }
    Ok(())
}
