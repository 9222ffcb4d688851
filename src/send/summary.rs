//! Send run summaries.

use strum_macros::Display;

/// How a table's rows reach Airtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncMode {
    Create,
    Update,
}

/// Outcome for one warehouse table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub table: String,
    pub mode: SyncMode,
    pub rows_read: usize,
    /// Rows created or updated.
    pub succeeded: usize,
    /// Rows in failed requests, and update rows without an id.
    pub failed: usize,
    /// Rows with a value no field could hold.
    pub skipped: usize,
    /// Ids of created records, in row order.
    pub created_ids: Vec<String>,
    /// Set when the table could not be read at all.
    pub error: Option<String>,
}

impl TableSummary {
    pub fn new(table: impl Into<String>, mode: SyncMode) -> Self {
        Self {
            table: table.into(),
            mode,
            rows_read: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            created_ids: Vec::new(),
            error: None,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.failed > 0 || self.skipped > 0
    }
}

/// Outcome of one send run, one entry per configured table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendSummary {
    pub tables: Vec<TableSummary>,
}

impl SendSummary {
    fn total(&self, mode: Option<SyncMode>, count: impl Fn(&TableSummary) -> usize) -> usize {
        self.tables
            .iter()
            .filter(|t| mode.map_or(true, |m| t.mode == m))
            .map(count)
            .sum()
    }

    /// Records created across all tables.
    pub fn created(&self) -> usize {
        self.total(Some(SyncMode::Create), |t| t.succeeded)
    }

    /// Records updated across all tables.
    pub fn updated(&self) -> usize {
        self.total(Some(SyncMode::Update), |t| t.succeeded)
    }

    pub fn failed(&self) -> usize {
        self.total(None, |t| t.failed)
    }

    pub fn skipped(&self) -> usize {
        self.total(None, |t| t.skipped)
    }

    /// Tables that could not be read.
    pub fn failed_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.error.is_some()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.tables.iter().any(TableSummary::has_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(mode: SyncMode, succeeded: usize, failed: usize, skipped: usize) -> TableSummary {
        TableSummary {
            succeeded,
            failed,
            skipped,
            ..TableSummary::new("marts.t", mode)
        }
    }

    #[test]
    fn test_totals_by_mode() {
        let summary = SendSummary {
            tables: vec![
                table(SyncMode::Create, 2, 0, 0),
                table(SyncMode::Update, 5, 1, 0),
                table(SyncMode::Create, 3, 10, 2),
            ],
        };
        assert_eq!(summary.created(), 5);
        assert_eq!(summary.updated(), 5);
        assert_eq!(summary.failed(), 11);
        assert_eq!(summary.skipped(), 2);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_clean_run_has_no_failures() {
        let summary = SendSummary {
            tables: vec![table(SyncMode::Create, 2, 0, 0)],
        };
        assert!(!summary.has_failures());
        assert_eq!(summary.failed_tables(), 0);
    }

    #[test]
    fn test_unreadable_table_is_a_failure() {
        let mut unreadable = TableSummary::new("marts.gone", SyncMode::Create);
        unreadable.error = Some("Table marts.gone does not exist".to_string());
        let summary = SendSummary {
            tables: vec![unreadable],
        };
        assert_eq!(summary.failed_tables(), 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(SyncMode::Create.to_string(), "create");
        assert_eq!(SyncMode::Update.to_string(), "update");
    }
}
