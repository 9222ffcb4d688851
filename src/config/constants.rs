//! Configuration constants.
//!
//! This module defines the operational defaults used throughout the crate:
//! Airtable API limits, retry schedule, sampling window and warehouse limits.

use std::time::Duration;

/// Default Airtable API root. Overridable so tests can point at a mock server.
pub const DEFAULT_API_URL: &str = "https://api.airtable.com";

/// Environment variable holding the Airtable personal access token.
pub const API_KEY_ENV: &str = "AIRTABLE_API_KEY";

/// Default warehouse connection URL (SQLite file next to the working directory).
pub const DEFAULT_WAREHOUSE_URL: &str = "sqlite:./warehouse.db";

// Airtable API limits
/// Requests per second allowed per base on Airtable's default tier.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;
/// Maximum records accepted by one create/update request.
pub const MAX_RECORDS_PER_REQUEST: usize = 10;
/// Maximum (and default) page size for list requests.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Per-request HTTP timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// Retry strategy
/// Delay before the first retry of a rate-limited or failed request.
pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;
/// Upper bound for a single backoff delay.
pub const RETRY_MAX_DELAY_SECS: u64 = 30;
/// Total attempts per request, initial attempt included.
pub const RETRY_MAX_ATTEMPTS: usize = 5;

/// How many times a listing is restarted after the store expires its iterator.
pub const ITERATOR_RESTART_LIMIT: usize = 3;

/// Number of observed values inspected when inferring a computed field's type.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

// Warehouse limits
/// Bind parameters allowed in a single INSERT statement.
/// SQLite's compile-time default is 32766; stay well under it.
pub const MAX_BIND_PARAMETERS: usize = 30_000;
/// Suffix of the staging table used while replacing a destination table.
pub const STAGING_TABLE_SUFFIX: &str = "__loader_tmp";

// HTTP status codes (for clarity and consistency)
pub const HTTP_STATUS_UNAUTHORIZED: u16 = 401;
pub const HTTP_STATUS_FORBIDDEN: u16 = 403;
pub const HTTP_STATUS_NOT_FOUND: u16 = 404;
pub const HTTP_STATUS_UNPROCESSABLE: u16 = 422;
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Airtable error type returned when a paginated listing must be restarted.
pub const ITERATOR_NOT_AVAILABLE: &str = "LIST_RECORDS_ITERATOR_NOT_AVAILABLE";
