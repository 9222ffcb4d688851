//! Value conversion between remote fields and warehouse columns.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error_handling::TypeMappingError;
use crate::remote::{Attachment, FieldValue};
use crate::warehouse::{parse_date, parse_timestamp, WarehouseColumnType, WarehouseValue};

use super::warehouse_to_remote_type;

/// Separator for several values packed into one text cell.
const LIST_SEPARATOR: char = '|';

fn mapping_error(
    column_type: WarehouseColumnType,
    value: impl ToString,
    reason: &str,
) -> TypeMappingError {
    TypeMappingError::new(warehouse_to_remote_type(column_type), value, reason)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn date_of(text: &str) -> Option<NaiveDate> {
    parse_date(text).or_else(|| parse_timestamp(text).map(|ts| ts.date_naive()))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn field_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Number(n) => format_number(*n),
        FieldValue::Unknown(Value::String(s)) => s.clone(),
        other => match other.to_json() {
            Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

/// Converts a remote value for a warehouse column of `column_type`.
///
/// # Errors
///
/// `TypeMappingError` if the value cannot be stored in the column.
pub fn remote_to_warehouse_value(
    column_type: WarehouseColumnType,
    value: &FieldValue,
) -> Result<WarehouseValue, TypeMappingError> {
    let fail = |reason: &str| mapping_error(column_type, value, reason);
    let converted = match column_type {
        WarehouseColumnType::Text | WarehouseColumnType::LargeText => {
            WarehouseValue::Text(field_text(value))
        }
        WarehouseColumnType::Number => match value {
            FieldValue::Number(n) => WarehouseValue::Number(*n),
            FieldValue::Text(s) => s
                .trim()
                .parse()
                .map(WarehouseValue::Number)
                .map_err(|_| fail("expected a number"))?,
            FieldValue::Unknown(Value::Number(n)) => n
                .as_f64()
                .map(WarehouseValue::Number)
                .ok_or_else(|| fail("number out of range"))?,
            _ => return Err(fail("expected a number")),
        },
        WarehouseColumnType::Boolean => match value {
            FieldValue::Boolean(b) | FieldValue::Unknown(Value::Bool(b)) => {
                WarehouseValue::Boolean(*b)
            }
            FieldValue::Text(s) => parse_bool(s)
                .map(WarehouseValue::Boolean)
                .ok_or_else(|| fail("expected a boolean"))?,
            _ => return Err(fail("expected a boolean")),
        },
        WarehouseColumnType::Date => match value {
            FieldValue::Date(d) => WarehouseValue::Date(*d),
            FieldValue::DateTime(ts) => WarehouseValue::Date(ts.date_naive()),
            FieldValue::Text(s) | FieldValue::Unknown(Value::String(s)) => date_of(s)
                .map(WarehouseValue::Date)
                .ok_or_else(|| fail("expected a YYYY-MM-DD date"))?,
            _ => return Err(fail("expected a date")),
        },
        WarehouseColumnType::Timestamp => match value {
            FieldValue::DateTime(ts) => WarehouseValue::Timestamp(*ts),
            FieldValue::Date(d) => WarehouseValue::Timestamp(d.and_time(Default::default()).and_utc()),
            FieldValue::Text(s) | FieldValue::Unknown(Value::String(s)) => parse_timestamp(s)
                .or_else(|| parse_date(s).map(|d| d.and_time(Default::default()).and_utc()))
                .map(WarehouseValue::Timestamp)
                .ok_or_else(|| fail("expected an RFC 3339 timestamp"))?,
            _ => return Err(fail("expected a timestamp")),
        },
        WarehouseColumnType::TextArray => match value {
            FieldValue::StringList(items) => WarehouseValue::TextArray(items.clone()),
            FieldValue::Text(s) => WarehouseValue::TextArray(vec![s.clone()]),
            _ => return Err(fail("expected a list of strings")),
        },
        WarehouseColumnType::Json => WarehouseValue::Json(value.to_json()),
    };
    Ok(converted)
}

fn split_list(text: &str) -> Vec<String> {
    if text.trim_start().starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(text) {
            return items;
        }
    }
    text.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn attachments_from_json(json: &Value) -> Option<Vec<Attachment>> {
    match json {
        Value::Array(_) => serde_json::from_value(json.clone()).ok(),
        Value::Object(_) => serde_json::from_value(json.clone()).ok().map(|a| vec![a]),
        _ => None,
    }
}

/// Converts a warehouse cell for a remote field whose column type is
/// `column_type`. `Null` converts to `None`: the field is left out of the
/// payload.
///
/// # Errors
///
/// `TypeMappingError` if the value cannot be represented in the field.
pub fn warehouse_to_remote_value(
    column_type: WarehouseColumnType,
    value: &WarehouseValue,
) -> Result<Option<FieldValue>, TypeMappingError> {
    if value.is_null() {
        return Ok(None);
    }
    let fail = |reason: &str| mapping_error(column_type, value, reason);
    let converted = match column_type {
        WarehouseColumnType::Text | WarehouseColumnType::LargeText => {
            FieldValue::Text(value.to_text().unwrap_or_default())
        }
        WarehouseColumnType::Number => match value {
            WarehouseValue::Integer(i) => FieldValue::Number(*i as f64),
            WarehouseValue::Number(n) if n.is_finite() => FieldValue::Number(*n),
            WarehouseValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
                .ok_or_else(|| fail("expected a number"))?,
            _ => return Err(fail("expected a number")),
        },
        WarehouseColumnType::Boolean => match value {
            WarehouseValue::Boolean(b) => FieldValue::Boolean(*b),
            WarehouseValue::Integer(0) => FieldValue::Boolean(false),
            WarehouseValue::Integer(1) => FieldValue::Boolean(true),
            WarehouseValue::Text(s) => parse_bool(s)
                .map(FieldValue::Boolean)
                .ok_or_else(|| fail("expected a boolean"))?,
            _ => return Err(fail("expected a boolean")),
        },
        WarehouseColumnType::Date => match value {
            WarehouseValue::Date(d) => FieldValue::Date(*d),
            WarehouseValue::Timestamp(ts) => FieldValue::Date(ts.date_naive()),
            WarehouseValue::Text(s) => date_of(s)
                .map(FieldValue::Date)
                .ok_or_else(|| fail("expected a YYYY-MM-DD date"))?,
            _ => return Err(fail("expected a date")),
        },
        WarehouseColumnType::Timestamp => match value {
            WarehouseValue::Timestamp(ts) => FieldValue::DateTime(*ts),
            WarehouseValue::Date(d) => FieldValue::DateTime(d.and_time(Default::default()).and_utc()),
            WarehouseValue::Text(s) => parse_timestamp(s)
                .or_else(|| parse_date(s).map(|d| d.and_time(Default::default()).and_utc()))
                .map(FieldValue::DateTime)
                .ok_or_else(|| fail("expected an RFC 3339 timestamp"))?,
            _ => return Err(fail("expected a timestamp")),
        },
        WarehouseColumnType::TextArray => match value {
            WarehouseValue::TextArray(items) => FieldValue::StringList(items.clone()),
            WarehouseValue::Text(s) => FieldValue::StringList(split_list(s)),
            WarehouseValue::Json(json) => serde_json::from_value::<Vec<String>>(json.clone())
                .map(FieldValue::StringList)
                .map_err(|_| fail("expected a list of strings"))?,
            _ => return Err(fail("expected a list of strings")),
        },
        WarehouseColumnType::Json => match value {
            WarehouseValue::Json(json) => attachments_from_json(json)
                .map(FieldValue::Attachments)
                .ok_or_else(|| fail("expected attachment objects with a url"))?,
            WarehouseValue::Text(s) => match serde_json::from_str::<Value>(s) {
                Ok(json) => attachments_from_json(&json)
                    .map(FieldValue::Attachments)
                    .ok_or_else(|| fail("expected attachment objects with a url"))?,
                Err(_) => {
                    let urls = split_list(s);
                    if urls.is_empty() || !urls.iter().all(|u| url::Url::parse(u).is_ok()) {
                        return Err(fail("expected attachment URLs"));
                    }
                    FieldValue::Attachments(
                        urls.into_iter()
                            .map(|url| Attachment {
                                id: None,
                                url,
                                filename: None,
                                size: None,
                                mime_type: None,
                            })
                            .collect(),
                    )
                }
            },
            _ => return Err(fail("expected attachments")),
        },
    };
    Ok(Some(converted))
}
