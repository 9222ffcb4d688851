//! Run statistics printing.

use log::{info, warn};

use crate::load::LoadSummary;
use crate::send::SendSummary;

/// Prints the outcome of a load to the log.
pub fn print_load_statistics(summary: &LoadSummary, elapsed_seconds: f64) {
    let columns: Vec<String> = summary
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.column_type))
        .collect();
    info!("Columns of {}: {}", summary.destination, columns.join(", "));

    if !summary.warnings.is_empty() {
        info!("Warnings ({} total):", summary.warnings.len());
        for warning in &summary.warnings {
            info!("   {warning}");
        }
    }

    print_load_line(summary, elapsed_seconds);
}

fn print_load_line(summary: &LoadSummary, elapsed_seconds: f64) {
    info!(
        "✅ Loaded {} row{} into {} ({} skipped) in {:.1}s",
        summary.rows_loaded,
        if summary.rows_loaded == 1 { "" } else { "s" },
        summary.destination,
        summary.skipped,
        elapsed_seconds
    );
}

/// Prints per-table and overall send counts to the log.
pub fn print_send_statistics(summary: &SendSummary, elapsed_seconds: f64) {
    for table in &summary.tables {
        match &table.error {
            Some(error) => warn!("   {} ({}): not sent: {error}", table.table, table.mode),
            None => info!(
                "   {} ({}): {} read, {} succeeded, {} failed, {} skipped",
                table.table, table.mode, table.rows_read, table.succeeded, table.failed, table.skipped
            ),
        }
    }

    info!(
        "{} Sent {} table{} ({} created, {} updated, {} failed, {} skipped) in {:.1}s",
        if summary.has_failures() { "⚠️" } else { "✅" },
        summary.tables.len(),
        if summary.tables.len() == 1 { "" } else { "s" },
        summary.created(),
        summary.updated(),
        summary.failed(),
        summary.skipped(),
        elapsed_seconds
    );
    if summary.failed_tables() > 0 {
        warn!("{} table(s) could not be read", summary.failed_tables());
    }
}
