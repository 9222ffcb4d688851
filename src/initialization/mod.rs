//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - The logger
//! - The authenticated HTTP client
//! - The request throttle shared by every Airtable call
//! - The warehouse connection pool

mod client;
mod logger;
mod rate_limiter;

// Re-export public API
pub use client::init_client;
pub use logger::init_logger_with;
pub use rate_limiter::{init_rate_limiter, RateLimiter, Throttle, Unthrottled};

pub use crate::warehouse::init_sqlite_pool;
