//! Send configuration file.
//!
//! The send command reads a YAML document naming the Airtable base and table
//! and the warehouse tables whose rows are sent:
//!
//! ```yaml
//! airtable_base_id: appXXXXXXXXXXXXXX
//! airtable_table_name: Contacts
//! tables:
//!   - analytics.marts.new_contacts
//!   - table: analytics.marts.contact_updates
//!     update: true
//! ```
//!
//! Entries may be a bare table name (create mode) or a map with an optional
//! `update` flag.

use std::path::Path;

use serde::Deserialize;

use crate::error_handling::ConfigError;
use crate::warehouse::QualifiedName;

/// One warehouse table to send, and whether its rows update existing records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTableConfig {
    pub table: QualifiedName,
    pub update: bool,
}

impl SyncTableConfig {
    pub fn create(table: QualifiedName) -> Self {
        Self {
            table,
            update: false,
        }
    }

    pub fn update(table: QualifiedName) -> Self {
        Self {
            table,
            update: true,
        }
    }
}

/// Parsed send configuration.
#[derive(Debug, Clone)]
pub struct SyncFileConfig {
    pub base_id: String,
    pub table_name: String,
    pub tables: Vec<SyncTableConfig>,
}

#[derive(Debug, Deserialize)]
struct RawSyncFile {
    airtable_base_id: String,
    airtable_table_name: String,
    #[serde(default)]
    tables: Vec<RawTableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTableEntry {
    Name(String),
    Detailed {
        table: String,
        #[serde(default)]
        update: bool,
    },
}

impl SyncFileConfig {
    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawSyncFile =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if raw.airtable_base_id.trim().is_empty() {
            return Err(ConfigError::MissingValue("airtable_base_id"));
        }
        if raw.airtable_table_name.trim().is_empty() {
            return Err(ConfigError::MissingValue("airtable_table_name"));
        }

        let tables = raw
            .tables
            .into_iter()
            .map(|entry| {
                let (name, update) = match entry {
                    RawTableEntry::Name(name) => (name, false),
                    RawTableEntry::Detailed { table, update } => (table, update),
                };
                Ok(SyncTableConfig {
                    table: QualifiedName::parse(&name)?,
                    update,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            base_id: raw.airtable_base_id,
            table_name: raw.airtable_table_name,
            tables,
        })
    }

    /// Reads and parses a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&text)
    }
}
