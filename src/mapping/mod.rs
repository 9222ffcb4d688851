//! Type mapping between Airtable fields and warehouse columns.
//!
//! This module provides:
//! - Declared field type to column type mapping, and its inverse
//! - Sample-based inference for computed fields
//! - Value conversion in both directions
//! - Column name normalization
//!
//! Everything here is pure: no I/O, no hidden state.

mod inference;
mod names;
mod values;

use crate::error_handling::TypeMappingError;
use crate::remote::{FieldValue, RemoteField, RemoteFieldType};
use crate::warehouse::{WarehouseColumnType, WarehouseValue};

// Re-export public API
pub use inference::infer_column_type;
pub use names::{column_matches_field, normalize_column_name};
pub use values::{remote_to_warehouse_value, warehouse_to_remote_value};

/// Remote field type whose values have the shape of `column_type`.
pub fn warehouse_to_remote_type(column_type: WarehouseColumnType) -> RemoteFieldType {
    match column_type {
        WarehouseColumnType::Text => RemoteFieldType::SingleLineText,
        WarehouseColumnType::LargeText => RemoteFieldType::LongText,
        WarehouseColumnType::Number => RemoteFieldType::Number,
        WarehouseColumnType::Boolean => RemoteFieldType::Checkbox,
        WarehouseColumnType::Date => RemoteFieldType::Date,
        WarehouseColumnType::Timestamp => RemoteFieldType::DateTime,
        WarehouseColumnType::TextArray => RemoteFieldType::MultipleSelects,
        WarehouseColumnType::Json => RemoteFieldType::Attachment,
    }
}

/// Maps field types to column types.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper {
    sample_size: usize,
}

impl TypeMapper {
    /// `sample_size` bounds how many values inference inspects.
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size: sample_size.max(1),
        }
    }

    /// Column type for `field`.
    ///
    /// Declared types map through a fixed table. Computed and untyped fields
    /// are inferred from at most `sample_size` of `samples`.
    pub fn remote_to_warehouse_type<'a, I>(&self, field: &RemoteField, samples: I) -> WarehouseColumnType
    where
        I: IntoIterator<Item = &'a FieldValue>,
    {
        match &field.field_type {
            RemoteFieldType::SingleLineText => WarehouseColumnType::Text,
            RemoteFieldType::LongText => WarehouseColumnType::LargeText,
            RemoteFieldType::Number => WarehouseColumnType::Number,
            RemoteFieldType::Checkbox => WarehouseColumnType::Boolean,
            RemoteFieldType::Date => WarehouseColumnType::Date,
            RemoteFieldType::DateTime => WarehouseColumnType::Timestamp,
            RemoteFieldType::SingleSelect => WarehouseColumnType::Text,
            RemoteFieldType::MultipleSelects | RemoteFieldType::LinkToRecord => {
                WarehouseColumnType::TextArray
            }
            RemoteFieldType::Attachment => WarehouseColumnType::Json,
            RemoteFieldType::Formula | RemoteFieldType::Unknown => {
                infer_column_type(samples.into_iter().take(self.sample_size))
            }
            RemoteFieldType::Unrecognized(_) => WarehouseColumnType::Text,
        }
    }

    /// Warning to record for a field whose type is outside the known set.
    pub fn unrecognized_type_warning(field: &RemoteField) -> Option<String> {
        match &field.field_type {
            RemoteFieldType::Unrecognized(type_name) => Some(format!(
                "Field '{}' has unrecognized type '{type_name}', loading it as text",
                field.name
            )),
            _ => None,
        }
    }

    /// Converts a remote value for storage in a `column_type` column.
    pub fn to_warehouse_value(
        &self,
        column_type: WarehouseColumnType,
        value: &FieldValue,
    ) -> Result<WarehouseValue, TypeMappingError> {
        remote_to_warehouse_value(column_type, value)
    }

    /// Converts a warehouse cell for `field`. `Ok(None)` leaves the field out.
    pub fn to_remote_value(
        &self,
        field: &RemoteField,
        value: &WarehouseValue,
    ) -> Result<Option<FieldValue>, TypeMappingError> {
        let column_type = self.remote_to_warehouse_type(field, std::iter::empty());
        warehouse_to_remote_value(column_type, value).map_err(|mut e| {
            e.target = format!("{} ({})", field.name, e.target);
            e
        })
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SAMPLE_SIZE)
    }
}
