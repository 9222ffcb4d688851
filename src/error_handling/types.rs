//! Error type definitions.
//!
//! This module defines all error types used throughout the crate. Each concern
//! gets its own enum; `SyncError` gathers the ones that abort a pipeline run.

use log::SetLoggerError;
use reqwest::{Error as ReqwestError, Method};
use thiserror::Error;

use crate::config::HTTP_STATUS_TOO_MANY_REQUESTS;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// The API key is missing or cannot be used as a header value.
    #[error("Invalid API key: {0}")]
    ApiKeyError(String),

    /// The Airtable API root is not a usable base URL.
    #[error("Invalid API URL: {0}")]
    ApiUrlError(String),
}

/// Bad or missing configuration. Fatal: detected before any remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Parse(String),

    #[error("Missing configuration value: {0}")]
    MissingValue(&'static str),

    #[error("Invalid table name '{0}': expected database.schema.table or schema.table")]
    InvalidTableName(String),

    #[error("Warehouse table {0} does not exist")]
    TableNotFound(String),

    #[error("Update table {0} has no `id` column")]
    MissingIdColumn(String),

    /// Per-row: an update row without a record id. Skipped, never fatal.
    #[error("Row {row} of {table} has an empty `id`")]
    EmptyRecordId { table: String, row: usize },
}

/// Errors returned by the Airtable client.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The table does not exist, or the token cannot see it.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Non-2xx response from the API.
    #[error("Airtable API error (HTTP {status}, retryable: {retryable}): {message}")]
    Api {
        status: u16,
        retryable: bool,
        message: String,
    },

    /// An update referenced a record id the store does not know.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// The store expired a paginated listing; the caller must restart it.
    #[error("Airtable list records iterator is no longer available")]
    IteratorExpired,

    /// Connection, timeout or body decoding failure.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] ReqwestError),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl RemoteError {
    /// Whether another attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Api { retryable, .. } => *retryable,
            RemoteError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RemoteError::Schema(_)
            | RemoteError::RecordNotFound(_)
            | RemoteError::IteratorExpired
            | RemoteError::Url(_) => false,
        }
    }

    /// Whether a failed `method` request may be sent again.
    ///
    /// A create is not idempotent: it is resent only when the store refused it
    /// with a 429 or the connection was never made.
    pub fn is_retryable_for(&self, method: &Method) -> bool {
        if method != Method::POST {
            return self.is_retryable();
        }
        match self {
            RemoteError::Api {
                status, retryable, ..
            } => *retryable && *status == HTTP_STATUS_TOO_MANY_REQUESTS,
            RemoteError::Transport(e) => e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Api { status, .. } => Some(*status),
            RemoteError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Marks an error as final once the retry budget is spent.
    pub(crate) fn exhausted(self) -> Self {
        match self {
            RemoteError::Api {
                status, message, ..
            } => RemoteError::Api {
                status,
                retryable: false,
                message,
            },
            other => other,
        }
    }
}

/// A value cannot be represented in the target field type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot map {value} to {target}: {reason}")]
pub struct TypeMappingError {
    pub target: String,
    pub value: String,
    pub reason: String,
}

impl TypeMappingError {
    pub fn new(target: impl ToString, value: impl ToString, reason: impl ToString) -> Self {
        Self {
            target: target.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Error types for warehouse operations.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// The warehouse rejected creating or replacing the destination table.
    #[error("Destination error: {0}")]
    Destination(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("Table {0} does not exist")]
    TableNotFound(String),

    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),
}

/// Failures that abort a pipeline run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote table missing, without fields, or with colliding column names.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Remote(RemoteError),

    #[error(transparent)]
    Destination(#[from] WarehouseError),
}

impl From<RemoteError> for SyncError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Schema(message) => SyncError::Schema(message),
            other => SyncError::Remote(other),
        }
    }
}
