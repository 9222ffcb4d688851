//! Column type inference for computed fields.
//!
//! Each sample is classified on its own, then the classes are joined. The
//! join is commutative and associative, so the result depends only on the
//! set of samples, not their order.

use crate::remote::FieldValue;
use crate::warehouse::{parse_date, parse_timestamp, WarehouseColumnType};
use serde_json::Value;

fn classify(value: &FieldValue) -> Option<WarehouseColumnType> {
    let column_type = match value {
        FieldValue::Boolean(_) => WarehouseColumnType::Boolean,
        FieldValue::Number(_) => WarehouseColumnType::Number,
        FieldValue::Date(_) => WarehouseColumnType::Date,
        FieldValue::DateTime(_) => WarehouseColumnType::Timestamp,
        FieldValue::Text(text) => classify_text(text),
        FieldValue::StringList(_) => WarehouseColumnType::TextArray,
        FieldValue::Attachments(_) => WarehouseColumnType::Json,
        FieldValue::Unknown(json) => match json {
            Value::Null => return None,
            Value::Bool(_) => WarehouseColumnType::Boolean,
            Value::Number(_) => WarehouseColumnType::Number,
            Value::String(text) => classify_text(text),
            Value::Array(_) | Value::Object(_) => WarehouseColumnType::Json,
        },
    };
    Some(column_type)
}

fn classify_text(text: &str) -> WarehouseColumnType {
    if parse_date(text).is_some() {
        WarehouseColumnType::Date
    } else if parse_timestamp(text).is_some() {
        WarehouseColumnType::Timestamp
    } else {
        WarehouseColumnType::Text
    }
}

fn join(a: WarehouseColumnType, b: WarehouseColumnType) -> WarehouseColumnType {
    use WarehouseColumnType::*;
    match (a, b) {
        (a, b) if a == b => a,
        (Date, Timestamp) | (Timestamp, Date) => Timestamp,
        (TextArray, Json) | (Json, TextArray) => Json,
        _ => Text,
    }
}

/// Infers the narrowest column type holding every sample.
///
/// Empty samples are ignored; with nothing left to inspect the column is text.
pub fn infer_column_type<'a, I>(samples: I) -> WarehouseColumnType
where
    I: IntoIterator<Item = &'a FieldValue>,
{
    samples
        .into_iter()
        .filter_map(classify)
        .reduce(join)
        .unwrap_or(WarehouseColumnType::Text)
}
