//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (API limits, retry schedule, etc.)
//! - CLI option types and parsing
//! - The YAML send configuration file

mod constants;
mod sync_file;
mod types;

// Re-export all constants
pub use constants::*;
pub use sync_file::{SyncFileConfig, SyncTableConfig};
pub use types::{Command, Config, GlobalOpts, LogFormat, LogLevel, Opt};
