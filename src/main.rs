//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `airtable_sync` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Exit codes
//!
//! Exit code 0 means everything was loaded or sent, 1 means the run failed,
//! and 2 means it finished but left rows or tables behind.

use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use airtable_sync::config::{Command, API_KEY_ENV};
use airtable_sync::error_handling::ConfigError;
use airtable_sync::initialization::init_logger_with;
use airtable_sync::{run_load, run_send, Config, Opt, SyncFileConfig};

const EXIT_FAILURE: i32 = 1;
const EXIT_PARTIAL: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting AIRTABLE_API_KEY in .env without exporting it manually
    let _ = dotenvy::dotenv();

    let opt = Opt::parse();

    let log_level = opt.global.log_level.clone();
    let log_format = opt.global.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run(opt).await {
        Ok(true) => Ok(()),
        Ok(false) => process::exit(EXIT_PARTIAL),
        Err(e) => {
            eprintln!("airtable_sync error: {:#}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}

/// Runs the selected command. Returns `false` when the run left work undone.
async fn run(opt: Opt) -> Result<bool> {
    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingValue(API_KEY_ENV))?;

    let config = Config {
        api_url: opt.global.api_url.clone(),
        api_key,
        rate_limit_rps: opt.global.rate_limit_rps,
        max_attempts: opt.global.max_attempts,
        ..Default::default()
    };

    match opt.command {
        Command::Load {
            base_id,
            table_name,
            destination,
        } => {
            let summary = run_load(
                &config,
                &opt.global.warehouse_url,
                &base_id,
                &table_name,
                &destination,
            )
            .await?;
            println!(
                "✅ Loaded {} row{} into {} ({} skipped)",
                summary.rows_loaded,
                if summary.rows_loaded == 1 { "" } else { "s" },
                summary.destination,
                summary.skipped
            );
            Ok(summary.skipped == 0)
        }
        Command::Send { config_file } => {
            let sync = SyncFileConfig::from_path(&config_file)
                .with_context(|| format!("Failed to read {}", config_file.display()))?;
            let summary = run_send(&config, &opt.global.warehouse_url, &sync).await?;
            println!(
                "{} Sent to {}: {} created, {} updated, {} failed, {} skipped",
                if summary.has_failures() { "⚠️" } else { "✅" },
                sync.table_name,
                summary.created(),
                summary.updated(),
                summary.failed(),
                summary.skipped()
            );
            Ok(!summary.has_failures())
        }
    }
}
