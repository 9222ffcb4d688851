//! Main application modules.
//!
//! This module provides statistics printing used by the run entry points.

pub mod statistics;

// Re-export public API
pub use statistics::{print_load_statistics, print_send_statistics};
