//! Schema-enforced Parquet encoding of coerced chunks.

use std::collections::HashSet;
use std::io::Cursor;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use histload_sdk::arrow::build_arrow_schema;
use histload_sdk::catalog::ColumnSchema;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::errors::TableError;

/// Value of the `created_by` key written into every Parquet footer.
pub const CREATED_BY: &str = concat!("histload ", env!("CARGO_PKG_VERSION"));

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(CREATED_BY.to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encode `batch` as one Parquet file with exactly the columns of `schema`,
/// in schema order.
///
/// # Errors
///
/// Returns [`TableError::Serialization`] if a column is missing, extra,
/// duplicated, or of the wrong type, if a non-nullable column holds nulls,
/// or if Parquet encoding fails.
pub fn to_parquet(batch: &RecordBatch, schema: &ColumnSchema) -> Result<Bytes, TableError> {
    let arrow_schema = build_arrow_schema(schema);
    let batch_schema = batch.schema();

    let mut seen = HashSet::new();
    for field in batch_schema.fields() {
        if !seen.insert(field.name().as_str()) {
            return Err(TableError::Serialization(format!(
                "column '{}' appears more than once in the batch",
                field.name()
            )));
        }
    }

    let missing: Vec<&str> = schema
        .names()
        .filter(|name| !seen.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(TableError::Serialization(format!(
            "batch is missing column(s): {}",
            missing.join(", ")
        )));
    }

    let extra: Vec<&str> = batch_schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|name| schema.get(name).is_none())
        .collect();
    if !extra.is_empty() {
        return Err(TableError::Serialization(format!(
            "batch has column(s) not in schema: {}",
            extra.join(", ")
        )));
    }

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(arrow_schema.fields().len());
    for field in arrow_schema.fields() {
        let (idx, _) = batch_schema.column_with_name(field.name()).ok_or_else(|| {
            TableError::Serialization(format!("missing column '{}'", field.name()))
        })?;
        let column = batch.column(idx);
        if column.data_type() != field.data_type() {
            return Err(TableError::Serialization(format!(
                "column '{}' is {} but schema requires {}",
                field.name(),
                column.data_type(),
                field.data_type()
            )));
        }
        if !field.is_nullable() && column.null_count() > 0 {
            return Err(TableError::Serialization(format!(
                "column '{}' is not nullable but holds {} null(s)",
                field.name(),
                column.null_count()
            )));
        }
        columns.push(column.clone());
    }

    let ordered = RecordBatch::try_new(arrow_schema.clone(), columns)
        .map_err(|e| TableError::Serialization(e.to_string()))?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, arrow_schema, Some(writer_properties()))
        .map_err(|e| TableError::Serialization(format!("parquet writer init failed: {e}")))?;
    writer
        .write(&ordered)
        .map_err(|e| TableError::Serialization(format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| TableError::Serialization(format!("parquet close failed: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use histload_sdk::catalog::{ColumnDef, LogicalType};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::{FileReader, SerializedFileReader};

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            ColumnDef::new("id", LogicalType::Int64, false),
            ColumnDef::new("name", LogicalType::String, true),
        ])
    }

    fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> RecordBatch {
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    #[test]
    fn writes_columns_in_schema_order() {
        // batch arrives with columns swapped
        let input = batch(
            vec![
                Field::new("name", DataType::Utf8, true),
                Field::new("id", DataType::Int64, true),
            ],
            vec![
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Int64Array::from(vec![1, 2])),
            ],
        );
        let bytes = to_parquet(&input, &schema()).unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        let out_schema = batches[0].schema();
        assert_eq!(out_schema.field(0).name(), "id");
        assert_eq!(out_schema.field(1).name(), "name");
        assert_eq!(out_schema.fields().len(), 2);
        assert_eq!(batches[0].num_rows(), 2);

        let file = SerializedFileReader::new(bytes).unwrap();
        let kv = file
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        assert!(kv
            .iter()
            .any(|e| e.key == "created_by" && e.value.as_deref() == Some(CREATED_BY)));
    }

    #[test]
    fn missing_column_rejected() {
        let input = batch(
            vec![Field::new("id", DataType::Int64, false)],
            vec![Arc::new(Int64Array::from(vec![1]))],
        );
        let err = to_parquet(&input, &schema()).unwrap_err();
        assert_eq!(
            err,
            TableError::Serialization("batch is missing column(s): name".into())
        );
    }

    #[test]
    fn extra_column_rejected() {
        let input = batch(
            vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, true),
                Field::new("rogue", DataType::Utf8, true),
            ],
            vec![
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(StringArray::from(vec!["a"])),
                Arc::new(StringArray::from(vec!["x"])),
            ],
        );
        let err = to_parquet(&input, &schema()).unwrap_err();
        assert!(err.to_string().contains("not in schema: rogue"));
    }

    #[test]
    fn mistyped_column_rejected() {
        let input = batch(
            vec![
                Field::new("id", DataType::Int32, false),
                Field::new("name", DataType::Utf8, true),
            ],
            vec![
                Arc::new(Int32Array::from(vec![1])),
                Arc::new(StringArray::from(vec!["a"])),
            ],
        );
        let err = to_parquet(&input, &schema()).unwrap_err();
        assert!(err.to_string().contains("'id' is Int32 but schema requires Int64"));
    }

    #[test]
    fn nulls_in_non_nullable_column_rejected() {
        let input = batch(
            vec![
                Field::new("id", DataType::Int64, true),
                Field::new("name", DataType::Utf8, true),
            ],
            vec![
                Arc::new(Int64Array::from(vec![Some(1), None])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        );
        let err = to_parquet(&input, &schema()).unwrap_err();
        assert!(err.to_string().contains("'id' is not nullable"));
    }

    #[test]
    fn empty_batch_still_produces_a_file() {
        let input = RecordBatch::new_empty(build_arrow_schema(&schema()));
        let bytes = to_parquet(&input, &schema()).unwrap();
        let file = SerializedFileReader::new(bytes).unwrap();
        assert_eq!(file.metadata().file_metadata().num_rows(), 0);
    }
}
