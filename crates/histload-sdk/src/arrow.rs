//! Conversion from [`LogicalType`] to arrow crate types.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use crate::catalog::{ColumnSchema, LogicalType};

/// Arrow type a [`LogicalType`] column is staged as.
///
/// This is the single source of truth for type mapping. The serializer
/// enforces it and the coercion engine targets it.
pub fn arrow_data_type(logical: LogicalType) -> DataType {
    match logical {
        LogicalType::Int16 => DataType::Int16,
        LogicalType::Int32 => DataType::Int32,
        LogicalType::Int64 => DataType::Int64,
        LogicalType::Float32 => DataType::Float32,
        LogicalType::String => DataType::Utf8,
        LogicalType::Date => DataType::Date32,
        LogicalType::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
        LogicalType::Decimal { precision, scale } => DataType::Decimal128(precision, scale),
    }
}

/// Build an Arrow Schema from a resolved column schema.
pub fn build_arrow_schema(schema: &ColumnSchema) -> Arc<Schema> {
    let fields: Vec<Field> = schema
        .columns()
        .iter()
        .map(|col| Field::new(&col.name, arrow_data_type(col.logical_type), col.nullable))
        .collect();
    Arc::new(Schema::new(fields))
}
