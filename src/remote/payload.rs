//! Airtable REST wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /v0/meta/bases/{base}/tables`
#[derive(Debug, Deserialize)]
pub(crate) struct TablesResponse {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableSchema {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FieldSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub options: Option<FieldOptions>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FieldOptions {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub name: String,
}

/// `GET /v0/{base}/{table}` page.
#[derive(Debug, Deserialize)]
pub(crate) struct ListRecordsResponse {
    #[serde(default)]
    pub records: Vec<Value>,
    pub offset: Option<String>,
}

/// One record as returned by the list, create and update endpoints.
///
/// Decoded per record so a single malformed entry does not fail its page.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordPayload {
    pub id: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Response of `POST` and `PATCH /v0/{base}/{table}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordsResponse {
    #[serde(default)]
    pub records: Vec<RecordPayload>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewRecord {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdatedRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Body of a create or update request. `typecast` lets the store coerce
/// strings into select options and linked record ids.
#[derive(Debug, Serialize)]
pub(crate) struct WriteRequest<T> {
    pub records: Vec<T>,
    pub typecast: bool,
}

/// Airtable error bodies come in two shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorBody {
    Detailed { error: ErrorDetail },
    Plain { error: String },
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorBody {
    /// Splits the body into `(type, message)`.
    pub fn into_parts(self) -> (String, String) {
        match self {
            ErrorBody::Detailed { error } => (error.error_type, error.message),
            ErrorBody::Plain { error } => (error.clone(), error),
        }
    }
}
