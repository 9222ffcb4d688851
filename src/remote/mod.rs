//! Airtable access.
//!
//! This module provides:
//! - The data model for fields, records and values
//! - A rate-limited, retrying REST client
//! - Write batching

mod batch;
mod client;
mod models;
mod payload;

// Re-export public API
pub use batch::{batch_ranges, effective_batch_size, SubBatchResult};
pub use client::{RecordPage, RecordUpdate, RemoteClient};
pub use models::{Attachment, FieldMap, FieldValue, RemoteField, RemoteFieldType, RemoteRecord};
