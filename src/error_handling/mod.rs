//! Error handling.
//!
//! This module provides:
//! - Error type definitions for every concern (config, remote, mapping, warehouse)
//! - Categorization of failed Airtable responses
//! - The bounded retry policy used by the remote client
//!
//! Failures are isolated to the smallest unit that can be skipped: a row
//! (`TypeMappingError`, empty update id), a sub-batch (`RemoteError`), or a
//! table. Only `SyncError` aborts a run.

mod categorization;
mod types;

// Re-export public API
pub use categorization::{categorize_response, RetryPolicy};
pub use types::{
    ConfigError, InitializationError, RemoteError, SyncError, TypeMappingError, WarehouseError,
};
