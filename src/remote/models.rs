//! Airtable data model.
//!
//! Field values arrive as loosely typed JSON. They are decoded once, at the
//! client boundary, into the closed [`FieldValue`] variant set, and encoded back
//! to JSON only when a write payload is built.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::EnumIter;

/// Declared type of an Airtable field.
///
/// Airtable reports many more type strings than the engine distinguishes;
/// variants of the same shape are folded together (`email` and `url` are
/// single line text, `currency` and `percent` are numbers, and so on). A type
/// string the engine has never seen is kept as `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIter)]
pub enum RemoteFieldType {
    SingleLineText,
    LongText,
    Number,
    Checkbox,
    Date,
    DateTime,
    SingleSelect,
    MultipleSelects,
    LinkToRecord,
    Attachment,
    /// Computed field (formula, rollup, lookup); its value type is inferred.
    Formula,
    /// The store did not report a type.
    Unknown,
    /// A type string outside the known set. Treated as text.
    Unrecognized(String),
}

impl RemoteFieldType {
    /// Parses an Airtable metadata type string.
    pub fn from_api(type_name: Option<&str>) -> Self {
        let Some(type_name) = type_name else {
            return RemoteFieldType::Unknown;
        };
        match type_name {
            "singleLineText" | "email" | "url" | "phoneNumber" => RemoteFieldType::SingleLineText,
            "multilineText" | "richText" => RemoteFieldType::LongText,
            "number" | "currency" | "percent" | "duration" | "rating" | "autoNumber"
            | "count" => RemoteFieldType::Number,
            "checkbox" => RemoteFieldType::Checkbox,
            "date" => RemoteFieldType::Date,
            "dateTime" | "createdTime" | "lastModifiedTime" => RemoteFieldType::DateTime,
            "singleSelect" => RemoteFieldType::SingleSelect,
            "multipleSelects" => RemoteFieldType::MultipleSelects,
            "multipleRecordLinks" => RemoteFieldType::LinkToRecord,
            "multipleAttachments" => RemoteFieldType::Attachment,
            "formula" | "rollup" | "lookup" | "multipleLookupValues" => RemoteFieldType::Formula,
            "" | "unknown" => RemoteFieldType::Unknown,
            other => RemoteFieldType::Unrecognized(other.to_string()),
        }
    }

    /// Canonical Airtable type string.
    pub fn as_str(&self) -> &str {
        match self {
            RemoteFieldType::SingleLineText => "singleLineText",
            RemoteFieldType::LongText => "multilineText",
            RemoteFieldType::Number => "number",
            RemoteFieldType::Checkbox => "checkbox",
            RemoteFieldType::Date => "date",
            RemoteFieldType::DateTime => "dateTime",
            RemoteFieldType::SingleSelect => "singleSelect",
            RemoteFieldType::MultipleSelects => "multipleSelects",
            RemoteFieldType::LinkToRecord => "multipleRecordLinks",
            RemoteFieldType::Attachment => "multipleAttachments",
            RemoteFieldType::Formula => "formula",
            RemoteFieldType::Unknown => "unknown",
            RemoteFieldType::Unrecognized(name) => name,
        }
    }

    /// Whether values of this type are inferred from samples.
    pub fn is_inferred(&self) -> bool {
        matches!(self, RemoteFieldType::Formula | RemoteFieldType::Unknown)
    }
}

impl fmt::Display for RemoteFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Airtable types whose values the store computes; writes to them are rejected.
const READ_ONLY_TYPES: &[&str] = &[
    "formula",
    "rollup",
    "lookup",
    "multipleLookupValues",
    "count",
    "autoNumber",
    "createdTime",
    "lastModifiedTime",
    "createdBy",
    "lastModifiedBy",
    "button",
];

/// One field of a remote table.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteField {
    pub name: String,
    pub field_type: RemoteFieldType,
    /// Allowed option labels, for select fields.
    pub options: Vec<String>,
    /// The store computes this field's values.
    pub read_only: bool,
}

impl RemoteField {
    pub fn new(name: impl Into<String>, field_type: RemoteFieldType) -> Self {
        let read_only = field_type == RemoteFieldType::Formula;
        Self {
            name: name.into(),
            field_type,
            options: Vec::new(),
            read_only,
        }
    }

    /// Builds a field from the metadata API's type string and choices.
    pub fn from_api(name: &str, type_name: Option<&str>, options: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            field_type: RemoteFieldType::from_api(type_name),
            options,
            read_only: type_name.is_some_and(|t| READ_ONLY_TYPES.contains(&t)),
        }
    }
}

/// File attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A field value in its remote shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    StringList(Vec<String>),
    Attachments(Vec<Attachment>),
    /// Any other JSON the store returned (collaborators, formula errors, ...).
    Unknown(Value),
}

impl FieldValue {
    /// Decodes a JSON value by its shape. `null` decodes to `None`.
    ///
    /// Dates arrive as strings and decode to `Text`; they are parsed when the
    /// destination column type is known.
    pub fn from_json(value: &Value) -> Option<FieldValue> {
        let decoded = match value {
            Value::Null => return None,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => FieldValue::Number(f),
                None => FieldValue::Unknown(value.clone()),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    FieldValue::StringList(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    )
                } else if items.iter().all(|v| v.get("url").is_some_and(Value::is_string)) {
                    match serde_json::from_value::<Vec<Attachment>>(value.clone()) {
                        Ok(attachments) => FieldValue::Attachments(attachments),
                        Err(_) => FieldValue::Unknown(value.clone()),
                    }
                } else {
                    FieldValue::Unknown(value.clone())
                }
            }
            Value::Object(_) => FieldValue::Unknown(value.clone()),
        };
        Some(decoded)
    }

    /// Encodes the value for a write payload.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            FieldValue::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            FieldValue::Attachments(attachments) => {
                serde_json::to_value(attachments).unwrap_or(Value::Null)
            }
            FieldValue::Unknown(v) => v.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Field name to value. Absent fields are empty in the store.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One record of a remote table.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Store-assigned identifier (`rec...`).
    pub id: String,
    pub created_time: Option<DateTime<Utc>>,
    pub fields: FieldMap,
}
