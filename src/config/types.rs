//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::constants::{
    DEFAULT_API_URL, DEFAULT_PAGE_SIZE, DEFAULT_REQUESTS_PER_SECOND, DEFAULT_SAMPLE_SIZE,
    DEFAULT_WAREHOUSE_URL, MAX_RECORDS_PER_REQUEST, RETRY_INITIAL_DELAY_MS, RETRY_MAX_ATTEMPTS,
    RETRY_MAX_DELAY_SECS,
};
use crate::error_handling::RetryPolicy;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Command-line options for the `airtable_sync` binary.
#[derive(Debug, Parser)]
#[command(
    name = "airtable_sync",
    version,
    about = "Load Airtable tables into a warehouse and send warehouse rows back to Airtable"
)]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain", global = true)]
    pub log_format: LogFormat,

    /// Warehouse connection URL
    #[arg(long, env = "WAREHOUSE_URL", default_value = DEFAULT_WAREHOUSE_URL, global = true)]
    pub warehouse_url: String,

    /// Airtable API root URL
    #[arg(long, env = "AIRTABLE_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Maximum requests per second sent to Airtable
    #[arg(long, default_value_t = DEFAULT_REQUESTS_PER_SECOND, global = true)]
    pub rate_limit_rps: u32,

    /// Attempts per request (initial attempt included) before giving up
    #[arg(long, default_value_t = RETRY_MAX_ATTEMPTS, global = true)]
    pub max_attempts: usize,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load every record of an Airtable table into a warehouse table
    Load {
        /// Airtable base identifier (e.g. appXXXXXXXXXXXXXX)
        #[arg(long)]
        base_id: String,

        /// Airtable table name
        #[arg(long)]
        table_name: String,

        /// Destination table (database.schema.table or schema.table)
        #[arg(long)]
        destination: String,
    },
    /// Send warehouse rows to Airtable as new or updated records
    Send {
        /// YAML file describing the base, table and warehouse tables to send
        #[arg(long)]
        config_file: PathBuf,
    },
}

/// Library configuration (no CLI dependencies).
///
/// This is the runtime configuration used by the remote client and the
/// pipelines. It can be constructed programmatically without any CLI.
///
/// # Examples
///
/// ```no_run
/// use airtable_sync::Config;
///
/// let config = Config {
///     api_key: "pat_example".to_string(),
///     rate_limit_rps: 2,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Airtable API root URL
    pub api_url: String,

    /// Airtable personal access token
    pub api_key: String,

    /// Maximum requests per second (0 disables throttling)
    pub rate_limit_rps: u32,

    /// Records per list page
    pub page_size: usize,

    /// Records per create/update request
    pub max_batch: usize,

    /// Values inspected when inferring a computed field's type
    pub sample_size: usize,

    /// Attempts per request, initial attempt included
    pub max_attempts: usize,

    /// Delay before the first retry
    pub retry_initial_delay: Duration,

    /// Upper bound for one backoff delay
    pub retry_max_delay: Duration,
}

impl Config {
    /// Builds the retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.retry_initial_delay,
            self.retry_max_delay,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            rate_limit_rps: DEFAULT_REQUESTS_PER_SECOND,
            page_size: DEFAULT_PAGE_SIZE,
            max_batch: MAX_RECORDS_PER_REQUEST,
            sample_size: DEFAULT_SAMPLE_SIZE,
            max_attempts: RETRY_MAX_ATTEMPTS,
            retry_initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            retry_max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_url, "https://api.airtable.com");
        assert_eq!(config.rate_limit_rps, 5);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_batch, 10);
        assert_eq!(config.max_attempts, 5);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_config_retry_policy() {
        let config = Config {
            max_attempts: 3,
            retry_initial_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(15),
            ..Default::default()
        };
        let delays: Vec<Duration> = config.retry_policy().delays().collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(10), Duration::from_millis(15)]
        );
    }

    #[test]
    fn test_opt_parses_load_command() {
        let opt = Opt::try_parse_from([
            "airtable_sync",
            "load",
            "--base-id",
            "appABC",
            "--table-name",
            "Contacts",
            "--destination",
            "raw.airtable.contacts",
        ])
        .expect("load command should parse");
        match opt.command {
            Command::Load {
                base_id,
                table_name,
                destination,
            } => {
                assert_eq!(base_id, "appABC");
                assert_eq!(table_name, "Contacts");
                assert_eq!(destination, "raw.airtable.contacts");
            }
            Command::Send { .. } => panic!("expected load command"),
        }
        assert_eq!(opt.global.rate_limit_rps, 5);
    }

    #[test]
    fn test_opt_parses_send_command_with_globals() {
        let opt = Opt::try_parse_from([
            "airtable_sync",
            "send",
            "--config-file",
            "sync.yaml",
            "--rate-limit-rps",
            "2",
            "--log-format",
            "json",
        ])
        .expect("send command should parse");
        assert!(matches!(opt.command, Command::Send { .. }));
        assert_eq!(opt.global.rate_limit_rps, 2);
        assert!(matches!(opt.global.log_format, LogFormat::Json));
    }

    #[test]
    fn test_opt_rejects_load_without_destination() {
        let result = Opt::try_parse_from([
            "airtable_sync",
            "load",
            "--base-id",
            "appABC",
            "--table-name",
            "Contacts",
        ]);
        assert!(result.is_err());
    }
}
