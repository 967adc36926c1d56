//! Per-chunk type coercion and audit column population.
//!
//! A [`CoercionPlan`] is derived once per table from the source catalog and
//! applied to every extracted chunk, in this order: bit columns widened to
//! int16, tinyint columns widened to int16, decimal columns re-parsed and
//! rescaled, date columns truncated to calendar dates, then every remaining
//! column cast to its resolved type. Audit columns are appended last.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Decimal128Builder, Int16Array,
    Int32Array, StringArray, TimestampMillisecondArray,
};
use arrow::compute::kernels::cast::{cast, cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use histload_sdk::arrow::arrow_data_type;
use histload_sdk::catalog::{CatalogColumn, ColumnSchema, LogicalType};
use sha2::{Digest, Sha256};

use crate::errors::TableError;
use crate::schema::{
    is_audit_column, SchemaMode, ROW_HASH_COLUMN, RUN_ID_COLUMN, UPDATED_BY_COLUMN,
    UPDATED_TS_COLUMN,
};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Text a missing decimal value is rendered as before parsing.
pub const DECIMAL_SENTINEL: &str = "NaN";

/// A decimal value after its text round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalCell {
    /// Null in the source; staged as a Parquet null.
    NotANumber,
    Value(BigDecimal),
}

impl DecimalCell {
    /// Parse a rendered decimal. `NaN` (any case) is the null sentinel.
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case(DECIMAL_SENTINEL) {
            return Ok(Self::NotANumber);
        }
        BigDecimal::from_str(trimmed)
            .map(Self::Value)
            .map_err(|e| format!("'{trimmed}' is not a decimal: {e}"))
    }

    /// Unscaled `Decimal128` value at `scale`, or `None` for the sentinel.
    ///
    /// Fails if the value has more fractional digits than `scale` allows or
    /// more total digits than `precision`.
    pub fn to_decimal128(&self, precision: u8, scale: i8) -> Result<Option<i128>, String> {
        let Self::Value(value) = self else {
            return Ok(None);
        };
        let rescaled = value.with_scale(i64::from(scale));
        if &rescaled != value {
            return Err(format!("{value} does not fit scale {scale}"));
        }
        let (digits, _) = rescaled.as_bigint_and_exponent();
        let unscaled = digits
            .to_i128()
            .filter(|v| v.unsigned_abs() < 10u128.pow(u32::from(precision)))
            .ok_or_else(|| format!("{value} exceeds precision {precision}"))?;
        Ok(Some(unscaled))
    }
}

/// Settings that do not come from the catalog.
#[derive(Debug, Clone)]
pub struct CoercionOptions {
    /// Value written to the `updatedby` audit column.
    pub service_identity: String,
    /// Date columns left out of date truncation.
    pub date_exemptions: Vec<String>,
}

/// Column lists and settings applied to every chunk of one table.
#[derive(Debug, Clone)]
pub struct CoercionPlan {
    mode: SchemaMode,
    bit_columns: HashSet<String>,
    tinyint_columns: HashSet<String>,
    decimal_columns: HashSet<String>,
    date_columns: HashSet<String>,
    date_exemptions: HashSet<String>,
    service_identity: String,
}

impl CoercionPlan {
    /// Derive the column lists from the source catalog of the table.
    pub fn from_catalog(
        source_catalog: &[CatalogColumn],
        mode: SchemaMode,
        options: &CoercionOptions,
    ) -> Self {
        let names_of = |types: &[&str]| -> HashSet<String> {
            source_catalog
                .iter()
                .filter(|c| types.contains(&c.native_type.to_ascii_lowercase().as_str()))
                .map(|c| c.name.clone())
                .collect()
        };

        Self {
            mode,
            bit_columns: names_of(&["bit", "boolean"]),
            tinyint_columns: names_of(&["tinyint"]),
            decimal_columns: names_of(&["decimal", "numeric", "money", "smallmoney"]),
            date_columns: names_of(&["date"]),
            date_exemptions: options.date_exemptions.iter().cloned().collect(),
            service_identity: options.service_identity.clone(),
        }
    }

    /// Name a source column carries in the staged file.
    pub fn target_name(&self, source_name: &str) -> String {
        match self.mode {
            SchemaMode::Source => source_name.to_string(),
            SchemaMode::Destination => normalize_column_name(source_name),
        }
    }

    /// Coerce one extracted chunk and append the audit columns.
    ///
    /// `updated_at` is ceiling-rounded to the millisecond; `run_id` is the
    /// chunk's run id from the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Coercion`] naming the first column that could
    /// not be converted.
    pub fn coerce(
        &self,
        batch: &RecordBatch,
        schema: &ColumnSchema,
        run_id: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<RecordBatch, TableError> {
        let num_rows = batch.num_rows();
        let mut fields = Vec::with_capacity(batch.num_columns() + 4);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + 4);

        for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
            let source_name = field.name().as_str();
            let target_name = self.target_name(source_name);
            if is_audit_column(&target_name) {
                continue;
            }
            let target_type = schema.get(&target_name).map(|c| c.logical_type);
            let coerced = self
                .coerce_column(source_name, column, target_type)
                .map_err(|e| TableError::Coercion(format!("column '{source_name}': {e}")))?;
            fields.push(Field::new(target_name, coerced.data_type().clone(), true));
            arrays.push(coerced);
        }

        let row_hashes = row_hashes(&arrays, num_rows)
            .map_err(|e| TableError::Coercion(format!("row hash: {e}")))?;
        let updated_ms = ceil_to_millis(updated_at);

        let audit: [(&str, ArrayRef); 4] = [
            (
                ROW_HASH_COLUMN,
                Arc::new(StringArray::from(row_hashes)) as ArrayRef,
            ),
            (
                UPDATED_BY_COLUMN,
                Arc::new(StringArray::from(vec![self.service_identity.as_str(); num_rows])),
            ),
            (
                UPDATED_TS_COLUMN,
                Arc::new(TimestampMillisecondArray::from(vec![updated_ms; num_rows])),
            ),
            (
                RUN_ID_COLUMN,
                Arc::new(Int32Array::from(vec![run_id; num_rows])),
            ),
        ];
        for (name, array) in audit {
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| TableError::Coercion(e.to_string()))
    }

    fn coerce_column(
        &self,
        source_name: &str,
        column: &ArrayRef,
        target: Option<LogicalType>,
    ) -> Result<ArrayRef, String> {
        let mut array = Arc::clone(column);
        if self.bit_columns.contains(source_name) {
            array = bit_to_int16(&array)?;
        }
        if self.tinyint_columns.contains(source_name) {
            array = cast(&array, &DataType::Int16).map_err(|e| e.to_string())?;
        }
        if self.decimal_columns.contains(source_name) {
            array = coerce_decimal(&array, target)?;
        }
        if self.date_columns.contains(source_name) && !self.date_exemptions.contains(source_name)
        {
            array = truncate_to_date(&array)?;
        }
        match target {
            Some(logical) => conform(&array, logical),
            None => Ok(array),
        }
    }
}

/// Warehouse-safe column name: lower-cased, spaces to underscores, hyphens
/// dropped, runs of underscores collapsed.
pub fn normalize_column_name(name: &str) -> String {
    let mut normalized = name.to_lowercase().replace(' ', "_").replace('-', "");
    while normalized.contains("__") {
        normalized = normalized.replace("__", "_");
    }
    normalized
}

/// Milliseconds since the epoch, rounded up.
pub fn ceil_to_millis(ts: DateTime<Utc>) -> i64 {
    let millis = ts.timestamp_millis();
    if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    }
}

fn bit_to_int16(array: &ArrayRef) -> Result<ArrayRef, String> {
    let bools: BooleanArray = match array.data_type() {
        DataType::Boolean => array.as_boolean().clone(),
        DataType::Utf8 | DataType::LargeUtf8 => {
            let text = cast(array, &DataType::Utf8).map_err(|e| e.to_string())?;
            text.as_string::<i32>()
                .iter()
                .map(|v| v.map(parse_bool).transpose())
                .collect::<Result<BooleanArray, String>>()?
        }
        DataType::Null => BooleanArray::new_null(array.len()),
        dt if dt.is_integer() => {
            let ints = cast(array, &DataType::Int64).map_err(|e| e.to_string())?;
            ints.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map(|i| i != 0))
                .collect()
        }
        dt if dt.is_floating() => {
            let floats = cast(array, &DataType::Float64).map_err(|e| e.to_string())?;
            floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map(|f| f != 0.0))
                .collect()
        }
        other => return Err(format!("cannot interpret {other} as boolean")),
    };
    let widened: Int16Array = bools.iter().map(|v| v.map(i16::from)).collect();
    Ok(Arc::new(widened))
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "t" | "yes" => Ok(true),
        "false" | "0" | "f" | "no" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

/// Render every value as text (null as the sentinel) and parse it back.
fn decimal_cells(array: &ArrayRef) -> Result<Vec<DecimalCell>, String> {
    let options = FormatOptions::default().with_null(DECIMAL_SENTINEL);
    let formatter =
        ArrayFormatter::try_new(array.as_ref(), &options).map_err(|e| e.to_string())?;
    (0..array.len())
        .map(|i| {
            let text = formatter.value(i).try_to_string().map_err(|e| e.to_string())?;
            DecimalCell::parse(&text)
        })
        .collect()
}

fn coerce_decimal(array: &ArrayRef, target: Option<LogicalType>) -> Result<ArrayRef, String> {
    let cells = decimal_cells(array)?;
    match target {
        Some(LogicalType::Decimal { precision, scale }) => {
            let mut builder = Decimal128Builder::with_capacity(cells.len());
            for cell in &cells {
                builder.append_option(cell.to_decimal128(precision, scale)?);
            }
            let decimals = builder
                .finish()
                .with_precision_and_scale(precision, scale)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(decimals))
        }
        // Non-decimal target: leave the parsed text for the conform cast.
        _ => {
            let text: StringArray = cells
                .iter()
                .map(|cell| match cell {
                    DecimalCell::NotANumber => None,
                    DecimalCell::Value(v) => Some(v.to_string()),
                })
                .collect();
            Ok(Arc::new(text))
        }
    }
}

fn truncate_to_date(array: &ArrayRef) -> Result<ArrayRef, String> {
    match array.data_type() {
        DataType::Date32 => Ok(Arc::clone(array)),
        DataType::Timestamp(_, _) | DataType::Date64 | DataType::Null => {
            cast(array, &DataType::Date32).map_err(|e| e.to_string())
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let text = cast(array, &DataType::Utf8).map_err(|e| e.to_string())?;
            let dates = text
                .as_string::<i32>()
                .iter()
                .map(|v| v.map(parse_date).transpose())
                .collect::<Result<Date32Array, String>>()?;
            Ok(Arc::new(dates))
        }
        other => Err(format!("cannot truncate {other} to a date")),
    }
}

/// Days since the epoch for a date or date-time string.
fn parse_date(text: &str) -> Result<i32, String> {
    let trimmed = text.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.date())
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date())
        })
        .map_err(|_| format!("'{trimmed}' is not a date"))?;
    Ok(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
}

/// Checked cast to the resolved Arrow type.
fn conform(array: &ArrayRef, logical: LogicalType) -> Result<ArrayRef, String> {
    let target = arrow_data_type(logical);
    if array.data_type() == &target {
        return Ok(Arc::clone(array));
    }
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    cast_with_options(array, &target, &options).map_err(|e| e.to_string())
}

/// SHA-256 hex of `(v1,v2,...)` per row, nulls rendered empty.
fn row_hashes(arrays: &[ArrayRef], num_rows: usize) -> Result<Vec<String>, String> {
    let options = FormatOptions::default().with_null("");
    let formatters = arrays
        .iter()
        .map(|a| ArrayFormatter::try_new(a.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let mut hashes = Vec::with_capacity(num_rows);
    let mut line = String::new();
    for row in 0..num_rows {
        line.clear();
        line.push('(');
        for (i, formatter) in formatters.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            formatter
                .value(row)
                .write(&mut line)
                .map_err(|e| e.to_string())?;
        }
        line.push(')');
        let mut hasher = Sha256::new();
        hasher.update(line.as_bytes());
        hashes.push(format!("{:x}", hasher.finalize()));
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Decimal128Array, Float64Array, Int64Array, UInt8Array};
    use arrow::datatypes::TimeUnit;
    use chrono::TimeZone;
    use histload_sdk::catalog::ColumnDef;

    fn options() -> CoercionOptions {
        CoercionOptions {
            service_identity: "redshiftadmin".into(),
            date_exemptions: vec!["LastDayofWork".into()],
        }
    }

    fn catalog() -> Vec<CatalogColumn> {
        vec![
            CatalogColumn::new("Id", "bigint", false),
            CatalogColumn::new("IsActive", "bit", true),
            CatalogColumn::new("Grade", "tinyint", true),
            CatalogColumn::new("Salary", "decimal", true).with_numeric(10, 2),
            CatalogColumn::new("HireDate", "date", true),
            CatalogColumn::new("LastDayofWork", "date", true),
        ]
    }

    fn schema() -> ColumnSchema {
        let mut cols = vec![
            ColumnDef::new("Id", LogicalType::Int64, false),
            ColumnDef::new("IsActive", LogicalType::Int16, true),
            ColumnDef::new("Grade", LogicalType::Int16, true),
            ColumnDef::new(
                "Salary",
                LogicalType::Decimal {
                    precision: 10,
                    scale: 2,
                },
                true,
            ),
            ColumnDef::new("HireDate", LogicalType::Date, true),
            ColumnDef::new("LastDayofWork", LogicalType::String, true),
        ];
        cols.extend(crate::schema::audit_columns());
        ColumnSchema::new(cols)
    }

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Id", DataType::Int32, false),
            Field::new("IsActive", DataType::Boolean, true),
            Field::new("Grade", DataType::UInt8, true),
            Field::new("Salary", DataType::Utf8, true),
            Field::new("HireDate", DataType::Utf8, true),
            Field::new("LastDayofWork", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2, 3])),
                Arc::new(BooleanArray::from(vec![Some(true), Some(false), None])),
                Arc::new(UInt8Array::from(vec![Some(255), Some(0), None])),
                Arc::new(StringArray::from(vec![Some("1234.5"), None, Some("0.01")])),
                Arc::new(StringArray::from(vec![
                    Some("2024-03-01 17:45:00"),
                    Some("2024-03-02"),
                    None,
                ])),
                Arc::new(StringArray::from(vec![Some("2024-12-31 23:59:59"), None, None])),
            ],
        )
        .unwrap()
    }

    fn updated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
            + chrono::Duration::microseconds(1_500)
    }

    #[test]
    fn plan_lists_come_from_native_types() {
        let plan = CoercionPlan::from_catalog(&catalog(), SchemaMode::Source, &options());
        assert!(plan.bit_columns.contains("IsActive"));
        assert!(plan.tinyint_columns.contains("Grade"));
        assert!(plan.decimal_columns.contains("Salary"));
        assert_eq!(plan.date_columns.len(), 2);
        assert!(!plan.bit_columns.contains("Id"));
    }

    #[test]
    fn coerces_every_column_to_its_schema_type() {
        let plan = CoercionPlan::from_catalog(&catalog(), SchemaMode::Source, &options());
        let out = plan.coerce(&batch(), &schema(), -1, updated_at()).unwrap();

        assert_eq!(out.num_columns(), 10);
        assert_eq!(out.num_rows(), 3);

        let id = out.column(0).as_primitive::<Int64Type>();
        assert_eq!(id.values().to_vec(), vec![1, 2, 3]);

        let active = out.column(1).as_any().downcast_ref::<Int16Array>().unwrap();
        assert_eq!(active.value(0), 1);
        assert_eq!(active.value(1), 0);
        assert!(active.is_null(2));

        let grade = out.column(2).as_any().downcast_ref::<Int16Array>().unwrap();
        assert_eq!(grade.value(0), 255);
        assert!(grade.is_null(2));

        let salary = out
            .column(3)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(salary.data_type(), &DataType::Decimal128(10, 2));
        assert_eq!(salary.value(0), 123_450);
        assert!(salary.is_null(1));
        assert_eq!(salary.value(2), 1);

        let hired = out.column(4).as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(
            hired.value_as_date(0),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            hired.value_as_date(1),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
        assert!(hired.is_null(2));

        // exempt: untouched text
        assert_eq!(out.column(5).data_type(), &DataType::Utf8);
        assert_eq!(out.column(5).as_string::<i32>().value(0), "2024-12-31 23:59:59");
    }

    #[test]
    fn audit_columns_are_populated() {
        let plan = CoercionPlan::from_catalog(&catalog(), SchemaMode::Source, &options());
        let out = plan.coerce(&batch(), &schema(), -7, updated_at()).unwrap();
        let schema = out.schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            &names[6..],
            &["row_hash_code", "updatedby", "updated_utc_ts", "runid"]
        );

        let hashes = out.column(6).as_string::<i32>();
        assert_eq!(hashes.value(0).len(), 64);
        assert_ne!(hashes.value(0), hashes.value(1));

        assert_eq!(out.column(7).as_string::<i32>().value(2), "redshiftadmin");

        let ts = out.column(8);
        assert_eq!(
            ts.data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, None)
        );
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap().timestamp_millis() + 2;
        assert_eq!(
            ts.as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .unwrap()
                .value(0),
            expected
        );

        let run_ids = out.column(9).as_any().downcast_ref::<Int32Array>().unwrap();
        assert!(run_ids.iter().all(|v| v == Some(-7)));
    }

    #[test]
    fn row_hash_is_deterministic_and_renders_nulls_empty() {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![Some(1), None])),
            Arc::new(StringArray::from(vec![Some("a"), Some("b")])),
        ];
        let hashes = row_hashes(&arrays, 2).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(b"(1,a)");
        assert_eq!(hashes[0], format!("{:x}", hasher.finalize()));

        let mut hasher = Sha256::new();
        hasher.update(b"(,b)");
        assert_eq!(hashes[1], format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn decimal_sentinel_and_values() {
        assert_eq!(DecimalCell::parse("NaN").unwrap(), DecimalCell::NotANumber);
        assert_eq!(DecimalCell::parse("nan").unwrap(), DecimalCell::NotANumber);
        assert_eq!(
            DecimalCell::parse(" 12.340 ").unwrap(),
            DecimalCell::Value(BigDecimal::from_str("12.34").unwrap())
        );
        assert!(DecimalCell::parse("twelve").is_err());

        let cell = DecimalCell::parse("12.3").unwrap();
        assert_eq!(cell.to_decimal128(5, 2).unwrap(), Some(1230));
        assert_eq!(DecimalCell::NotANumber.to_decimal128(5, 2).unwrap(), None);
    }

    #[test]
    fn decimal_rescale_is_lossless_or_fails() {
        let too_precise = DecimalCell::parse("1.234").unwrap();
        assert!(too_precise
            .to_decimal128(10, 2)
            .unwrap_err()
            .contains("does not fit scale 2"));

        let too_wide = DecimalCell::parse("123456").unwrap();
        assert!(too_wide
            .to_decimal128(5, 0)
            .unwrap_err()
            .contains("exceeds precision 5"));

        let negative = DecimalCell::parse("-99.99").unwrap();
        assert_eq!(negative.to_decimal128(4, 2).unwrap(), Some(-9999));
    }

    #[test]
    fn decimal_from_float_source() {
        let array: ArrayRef = Arc::new(Float64Array::from(vec![Some(2.5), None]));
        let out = coerce_decimal(
            &array,
            Some(LogicalType::Decimal {
                precision: 19,
                scale: 4,
            }),
        )
        .unwrap();
        let dec = out.as_any().downcast_ref::<Decimal128Array>().unwrap();
        assert_eq!(dec.value(0), 25_000);
        assert!(dec.is_null(1));
    }

    #[test]
    fn bit_text_and_integer_inputs() {
        let text: ArrayRef = Arc::new(StringArray::from(vec![
            Some("true"),
            Some("0"),
            Some("YES"),
            Some("f"),
            None,
        ]));
        let out = bit_to_int16(&text).unwrap();
        let out = out.as_any().downcast_ref::<Int16Array>().unwrap();
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![Some(1), Some(0), Some(1), Some(0), None]
        );

        let ints: ArrayRef = Arc::new(Int32Array::from(vec![5, 0, -1]));
        let out = bit_to_int16(&ints).unwrap();
        let out = out.as_any().downcast_ref::<Int16Array>().unwrap();
        assert_eq!(out.values().to_vec(), vec![1, 0, 1]);

        let bad: ArrayRef = Arc::new(StringArray::from(vec!["maybe"]));
        assert!(bit_to_int16(&bad).is_err());
    }

    #[test]
    fn bad_date_text_is_a_coercion_error() {
        let plan = CoercionPlan::from_catalog(&catalog(), SchemaMode::Source, &options());
        let input = Arc::new(Schema::new(vec![Field::new("HireDate", DataType::Utf8, true)]));
        let batch = RecordBatch::try_new(
            input,
            vec![Arc::new(StringArray::from(vec!["not a date"]))],
        )
        .unwrap();
        let err = plan
            .coerce(&batch, &schema(), -1, updated_at())
            .unwrap_err();
        assert!(matches!(err, TableError::Coercion(_)));
        assert!(err.to_string().contains("column 'HireDate'"));
    }

    #[test]
    fn overflowing_cast_is_a_coercion_error() {
        let catalog = vec![CatalogColumn::new("Small", "smallint", true)];
        let plan = CoercionPlan::from_catalog(&catalog, SchemaMode::Source, &options());
        let schema = ColumnSchema::new(vec![ColumnDef::new("Small", LogicalType::Int16, true)]);
        let input = Arc::new(Schema::new(vec![Field::new("Small", DataType::Int32, true)]));
        let batch =
            RecordBatch::try_new(input, vec![Arc::new(Int32Array::from(vec![70_000]))]).unwrap();
        assert!(matches!(
            plan.coerce(&batch, &schema, -1, updated_at()),
            Err(TableError::Coercion(_))
        ));
    }

    #[test]
    fn destination_mode_normalizes_names() {
        let catalog = vec![CatalogColumn::new("Content Length - KB", "decimal", true)
            .with_numeric(10, 1)];
        let plan = CoercionPlan::from_catalog(&catalog, SchemaMode::Destination, &options());
        let mut cols = vec![ColumnDef::new(
            "content_length_kb",
            LogicalType::Decimal {
                precision: 10,
                scale: 1,
            },
            true,
        )];
        cols.extend(crate::schema::audit_columns());
        let schema = ColumnSchema::new(cols);

        let input = Arc::new(Schema::new(vec![Field::new(
            "Content Length - KB",
            DataType::Utf8,
            true,
        )]));
        let batch =
            RecordBatch::try_new(input, vec![Arc::new(StringArray::from(vec!["10.5"]))]).unwrap();
        let out = plan.coerce(&batch, &schema, -1, updated_at()).unwrap();
        assert_eq!(out.schema().field(0).name(), "content_length_kb");
        assert_eq!(out.column(0).data_type(), &DataType::Decimal128(10, 1));
    }

    #[test]
    fn normalize_column_names() {
        assert_eq!(
            normalize_column_name("Content Length - KB"),
            "content_length_kb"
        );
        assert_eq!(normalize_column_name("First  Name"), "first_name");
        assert_eq!(normalize_column_name("a___b"), "a_b");
        assert_eq!(normalize_column_name("already_ok"), "already_ok");
    }

    #[test]
    fn ceil_to_millis_rounds_up_partial_millis() {
        let exact = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(ceil_to_millis(exact), 1_000);
        let partial = exact + chrono::Duration::microseconds(1);
        assert_eq!(ceil_to_millis(partial), 1_001);
    }

    #[test]
    fn empty_chunk_gets_empty_audit_columns() {
        let plan = CoercionPlan::from_catalog(&catalog(), SchemaMode::Source, &options());
        let empty = RecordBatch::new_empty(batch().schema());
        let out = plan.coerce(&empty, &schema(), -1, updated_at()).unwrap();
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.num_columns(), 10);
    }
}
