//! Row-to-batch encoding for driver values.

use std::fmt::Write;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Date32Builder, Float32Builder, Float64Builder, Int16Builder,
    Int32Builder, Int64Builder, StringBuilder, TimestampMillisecondBuilder, UInt8Builder,
};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use tiberius::{ColumnData, FromSql, Row};

use crate::types::{Column, Encoding};

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Arrow schema of an extracted batch. Every field is nullable; the load
/// pipeline enforces nullability against the resolved schema.
pub fn scan_schema(columns: &[Column]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(&c.name, c.encoding.arrow_type(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Accumulates rows for one chunk.
pub struct BatchBuilder<'c> {
    columns: &'c [Column],
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl<'c> BatchBuilder<'c> {
    pub fn new(columns: &'c [Column], capacity: usize) -> Self {
        Self {
            columns,
            builders: columns
                .iter()
                .map(|c| ColumnBuilder::new(c.encoding, capacity))
                .collect(),
            rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Append one driver row.
    pub fn push_row(&mut self, row: Row) -> Result<(), String> {
        if row.len() != self.builders.len() {
            return Err(format!(
                "row has {} values, expected {}",
                row.len(),
                self.builders.len()
            ));
        }
        for ((builder, column), value) in self.builders.iter_mut().zip(self.columns).zip(row) {
            builder
                .append(value)
                .map_err(|e| format!("column '{}' ({}): {e}", column.name, column.native_type))?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self, schema: &SchemaRef) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = self.builders.into_iter().map(ColumnBuilder::finish).collect();
        RecordBatch::try_new(Arc::clone(schema), arrays)
    }
}

enum ColumnBuilder {
    Boolean(BooleanBuilder),
    UInt8(UInt8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Text(StringBuilder),
    Date(Date32Builder),
    TimestampMillis(TimestampMillisecondBuilder),
}

impl ColumnBuilder {
    fn new(encoding: Encoding, capacity: usize) -> Self {
        match encoding {
            Encoding::Boolean => Self::Boolean(BooleanBuilder::with_capacity(capacity)),
            Encoding::UInt8 => Self::UInt8(UInt8Builder::with_capacity(capacity)),
            Encoding::Int16 => Self::Int16(Int16Builder::with_capacity(capacity)),
            Encoding::Int32 => Self::Int32(Int32Builder::with_capacity(capacity)),
            Encoding::Int64 => Self::Int64(Int64Builder::with_capacity(capacity)),
            Encoding::Float32 => Self::Float32(Float32Builder::with_capacity(capacity)),
            Encoding::Float64 => Self::Float64(Float64Builder::with_capacity(capacity)),
            Encoding::Text => Self::Text(StringBuilder::with_capacity(capacity, capacity * 16)),
            Encoding::Date => Self::Date(Date32Builder::with_capacity(capacity)),
            Encoding::TimestampMillis => {
                Self::TimestampMillis(TimestampMillisecondBuilder::with_capacity(capacity))
            }
        }
    }

    fn append(&mut self, value: ColumnData<'static>) -> Result<(), String> {
        if is_null(&value) {
            self.append_null();
            return Ok(());
        }
        match self {
            Self::Boolean(b) => match value {
                ColumnData::Bit(v) => b.append_option(v),
                ColumnData::U8(v) => b.append_option(v.map(|n| n != 0)),
                other => return Err(mismatch("bit", &other)),
            },
            Self::UInt8(b) => match value {
                ColumnData::U8(v) => b.append_option(v),
                other => return Err(mismatch("tinyint", &other)),
            },
            Self::Int16(b) => match value {
                ColumnData::I16(v) => b.append_option(v),
                ColumnData::U8(v) => b.append_option(v.map(i16::from)),
                other => return Err(mismatch("smallint", &other)),
            },
            Self::Int32(b) => match value {
                ColumnData::I32(v) => b.append_option(v),
                ColumnData::I16(v) => b.append_option(v.map(i32::from)),
                ColumnData::U8(v) => b.append_option(v.map(i32::from)),
                other => return Err(mismatch("int", &other)),
            },
            Self::Int64(b) => match value {
                ColumnData::I64(v) => b.append_option(v),
                ColumnData::I32(v) => b.append_option(v.map(i64::from)),
                ColumnData::I16(v) => b.append_option(v.map(i64::from)),
                ColumnData::U8(v) => b.append_option(v.map(i64::from)),
                other => return Err(mismatch("bigint", &other)),
            },
            Self::Float32(b) => match value {
                ColumnData::F32(v) => b.append_option(v),
                #[allow(clippy::cast_possible_truncation)]
                ColumnData::F64(v) => b.append_option(v.map(|f| f as f32)),
                other => return Err(mismatch("real", &other)),
            },
            Self::Float64(b) => match value {
                ColumnData::F64(v) => b.append_option(v),
                ColumnData::F32(v) => b.append_option(v.map(f64::from)),
                other => return Err(mismatch("float", &other)),
            },
            Self::Text(b) => b.append_option(text_value(value)?),
            Self::Date(b) => b.append_option(date_value(&value)?),
            Self::TimestampMillis(b) => b.append_option(timestamp_millis(&value)?),
        }
        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            Self::Boolean(b) => b.append_null(),
            Self::UInt8(b) => b.append_null(),
            Self::Int16(b) => b.append_null(),
            Self::Int32(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float32(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Text(b) => b.append_null(),
            Self::Date(b) => b.append_null(),
            Self::TimestampMillis(b) => b.append_null(),
        }
    }

    fn finish(mut self) -> ArrayRef {
        match &mut self {
            Self::Boolean(b) => Arc::new(b.finish()),
            Self::UInt8(b) => Arc::new(b.finish()),
            Self::Int16(b) => Arc::new(b.finish()),
            Self::Int32(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float32(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
            Self::Text(b) => Arc::new(b.finish()),
            Self::Date(b) => Arc::new(b.finish()),
            Self::TimestampMillis(b) => Arc::new(b.finish()),
        }
    }
}

fn is_null(value: &ColumnData<'_>) -> bool {
    matches!(
        value,
        ColumnData::U8(None)
            | ColumnData::I16(None)
            | ColumnData::I32(None)
            | ColumnData::I64(None)
            | ColumnData::F32(None)
            | ColumnData::F64(None)
            | ColumnData::Bit(None)
            | ColumnData::String(None)
            | ColumnData::Guid(None)
            | ColumnData::Binary(None)
            | ColumnData::Numeric(None)
            | ColumnData::Xml(None)
            | ColumnData::DateTime(None)
            | ColumnData::SmallDateTime(None)
            | ColumnData::Time(None)
            | ColumnData::Date(None)
            | ColumnData::DateTime2(None)
            | ColumnData::DateTimeOffset(None)
    )
}

fn mismatch(expected: &str, value: &ColumnData<'_>) -> String {
    format!("expected {expected} value, driver returned {}", variant_name(value))
}

fn variant_name(value: &ColumnData<'_>) -> &'static str {
    match value {
        ColumnData::U8(_) => "tinyint",
        ColumnData::I16(_) => "smallint",
        ColumnData::I32(_) => "int",
        ColumnData::I64(_) => "bigint",
        ColumnData::F32(_) => "real",
        ColumnData::F64(_) => "float",
        ColumnData::Bit(_) => "bit",
        ColumnData::String(_) => "string",
        ColumnData::Guid(_) => "uniqueidentifier",
        ColumnData::Binary(_) => "binary",
        ColumnData::Numeric(_) => "numeric",
        ColumnData::Xml(_) => "xml",
        ColumnData::DateTime(_) => "datetime",
        ColumnData::SmallDateTime(_) => "smalldatetime",
        ColumnData::Time(_) => "time",
        ColumnData::Date(_) => "date",
        ColumnData::DateTime2(_) => "datetime2",
        ColumnData::DateTimeOffset(_) => "datetimeoffset",
        #[allow(unreachable_patterns)]
        _ => "unsupported",
    }
}

/// Text rendering for string-like and exact numeric columns. Money arrives
/// from the driver as a float and is rendered with its shortest exact
/// representation.
fn text_value(value: ColumnData<'static>) -> Result<Option<String>, String> {
    let text = match value {
        ColumnData::String(v) => v.map(|s| s.into_owned()),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()),
        ColumnData::Guid(v) => v.map(|g| g.to_string()),
        ColumnData::Xml(v) => v.map(|x| x.into_owned().into_string()),
        ColumnData::Binary(v) => v.map(|bytes| hex(&bytes)),
        ColumnData::F64(v) => v.map(|f| f.to_string()),
        ColumnData::F32(v) => v.map(|f| f.to_string()),
        ColumnData::I64(v) => v.map(|n| n.to_string()),
        ColumnData::I32(v) => v.map(|n| n.to_string()),
        ColumnData::I16(v) => v.map(|n| n.to_string()),
        ColumnData::U8(v) => v.map(|n| n.to_string()),
        other => return Err(mismatch("text", &other)),
    };
    Ok(text)
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn date_value(value: &ColumnData<'static>) -> Result<Option<i32>, String> {
    let date = match value {
        ColumnData::Date(_) => NaiveDate::from_sql(value).map_err(|e| e.to_string())?,
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(value)
                .map_err(|e| e.to_string())?
                .map(|dt| dt.date())
        }
        other => return Err(mismatch("date", other)),
    };
    Ok(date.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
}

/// Milliseconds since the Unix epoch. `time` values land on 1970-01-01 and
/// offset timestamps are converted to UTC.
fn timestamp_millis(value: &ColumnData<'static>) -> Result<Option<i64>, String> {
    let millis = match value {
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(value)
                .map_err(|e| e.to_string())?
                .map(|dt| dt.and_utc().timestamp_millis())
        }
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(value)
            .map_err(|e| e.to_string())?
            .map(|dt| dt.timestamp_millis()),
        ColumnData::Date(_) => NaiveDate::from_sql(value)
            .map_err(|e| e.to_string())?
            .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp_millis()),
        ColumnData::Time(_) => NaiveTime::from_sql(value)
            .map_err(|e| e.to_string())?
            .map(|t| {
                i64::from(t.num_seconds_from_midnight()) * 1000
                    + i64::from(t.nanosecond() / 1_000_000)
            }),
        other => return Err(mismatch("timestamp", other)),
    };
    Ok(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Date32Type, TimestampMillisecondType, UInt8Type};

    fn column(name: &str, native: &str, encoding: Encoding) -> Column {
        Column {
            name: name.to_string(),
            native_type: native.to_string(),
            encoding,
        }
    }

    fn builder(encoding: Encoding) -> ColumnBuilder {
        ColumnBuilder::new(encoding, 4)
    }

    #[test]
    fn bits_keep_nulls() {
        let mut b = builder(Encoding::Boolean);
        b.append(ColumnData::Bit(Some(true))).unwrap();
        b.append(ColumnData::Bit(None)).unwrap();
        b.append(ColumnData::Bit(Some(false))).unwrap();
        let array = b.finish();
        let bools = array.as_boolean();
        assert!(bools.value(0));
        assert!(bools.is_null(1));
        assert!(!bools.value(2));
    }

    #[test]
    fn tinyint_stays_unsigned() {
        let mut b = builder(Encoding::UInt8);
        b.append(ColumnData::U8(Some(255))).unwrap();
        let array = b.finish();
        assert_eq!(array.as_primitive::<UInt8Type>().value(0), 255);
    }

    #[test]
    fn binary_rendered_as_hex() {
        let mut b = builder(Encoding::Text);
        b.append(ColumnData::Binary(Some(Cow::Owned(vec![0x00, 0x1f, 0xab]))))
            .unwrap();
        let array = b.finish();
        assert_eq!(array.as_string::<i32>().value(0), "001fab");
    }

    #[test]
    fn money_rendered_as_text() {
        let mut b = builder(Encoding::Text);
        b.append(ColumnData::F64(Some(1234.5678))).unwrap();
        let array = b.finish();
        assert_eq!(array.as_string::<i32>().value(0), "1234.5678");
    }

    #[test]
    fn mismatched_driver_value_rejected() {
        let mut b = builder(Encoding::Int32);
        let err = b
            .append(ColumnData::String(Some(Cow::Borrowed("x"))))
            .unwrap_err();
        assert!(err.contains("expected int"));
        assert!(err.contains("string"));
    }

    #[test]
    fn dates_count_days_from_unix_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE,
            i32::try_from((date - epoch).num_days()).unwrap()
        );
        let mut b = builder(Encoding::Date);
        b.append(ColumnData::Date(None)).unwrap();
        let array = b.finish();
        assert!(array.as_primitive::<Date32Type>().is_null(0));
    }

    #[test]
    fn null_timestamp_appends_null() {
        let mut b = builder(Encoding::TimestampMillis);
        b.append(ColumnData::DateTime2(None)).unwrap();
        let array = b.finish();
        assert!(array.as_primitive::<TimestampMillisecondType>().is_null(0));
    }

    #[test]
    fn empty_builder_finishes_empty_batch() {
        let columns = vec![
            column("Id", "int", Encoding::Int32),
            column("Name", "nvarchar", Encoding::Text),
        ];
        let schema = scan_schema(&columns);
        let batch = BatchBuilder::new(&columns, 0).finish(&schema).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.schema().field(1).name(), "Name");
    }
}
