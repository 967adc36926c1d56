//! SQL Server -> Arrow extraction encodings.
//!
//! Extraction keeps values close to their native form; the load pipeline
//! decides the final logical type. Exact numerics travel as text so no
//! precision is lost before coercion.

use std::collections::HashSet;

use arrow::datatypes::{DataType, TimeUnit};
use histload_sdk::catalog::CatalogColumn;
use histload_sdk::error::ConnectorError;

/// How a column is carried in extracted batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Boolean,
    UInt8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Date,
    TimestampMillis,
}

impl Encoding {
    pub fn arrow_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::UInt8 => DataType::UInt8,
            Self::Int16 => DataType::Int16,
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Float32 => DataType::Float32,
            Self::Float64 => DataType::Float64,
            Self::Text => DataType::Utf8,
            Self::Date => DataType::Date32,
            Self::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
        }
    }
}

/// Resolve a `sys.types` name to its extraction encoding.
pub fn resolve(native_type: &str) -> Option<Encoding> {
    let encoding = match native_type.trim().to_ascii_lowercase().as_str() {
        "bit" => Encoding::Boolean,
        "tinyint" => Encoding::UInt8,
        "smallint" => Encoding::Int16,
        "int" => Encoding::Int32,
        "bigint" => Encoding::Int64,
        "real" => Encoding::Float32,
        "float" => Encoding::Float64,
        "decimal" | "numeric" | "money" | "smallmoney" => Encoding::Text,
        "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" | "sysname"
        | "uniqueidentifier" | "timestamp" | "rowversion" | "xml" => Encoding::Text,
        "date" => Encoding::Date,
        "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "time" => {
            Encoding::TimestampMillis
        }
        _ => return None,
    };
    Some(encoding)
}

/// One column of a full-table scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub native_type: String,
    pub encoding: Encoding,
}

/// Columns to scan, in catalog order. The catalog can list a column once
/// per type alias sharing its system type; the first entry wins.
pub fn scan_columns(catalog: &[CatalogColumn]) -> Result<Vec<Column>, ConnectorError> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(catalog.len());
    for entry in catalog {
        if !seen.insert(entry.name.as_str()) {
            continue;
        }
        let encoding = resolve(&entry.native_type).ok_or_else(|| {
            ConnectorError::schema(
                "UNSUPPORTED_TYPE",
                format!(
                    "column '{}' has unsupported type '{}'",
                    entry.name, entry.native_type
                ),
            )
        })?;
        columns.push(Column {
            name: entry.name.clone(),
            native_type: entry.native_type.clone(),
            encoding,
        });
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_numerics_travel_as_text() {
        for t in &["decimal", "numeric", "money", "smallmoney"] {
            assert_eq!(resolve(t), Some(Encoding::Text), "type: {t}");
        }
    }

    #[test]
    fn temporal_types() {
        assert_eq!(resolve("date"), Some(Encoding::Date));
        for t in &["datetime", "datetime2", "smalldatetime", "datetimeoffset", "time"] {
            assert_eq!(resolve(t), Some(Encoding::TimestampMillis), "type: {t}");
        }
        assert_eq!(
            Encoding::TimestampMillis.arrow_type(),
            DataType::Timestamp(TimeUnit::Millisecond, None)
        );
    }

    #[test]
    fn bit_and_tinyint_kept_native() {
        assert_eq!(resolve("BIT"), Some(Encoding::Boolean));
        assert_eq!(resolve("tinyint"), Some(Encoding::UInt8));
    }

    #[test]
    fn unknown_type_is_none() {
        assert_eq!(resolve("geography"), None);
        assert_eq!(resolve("hierarchyid"), None);
    }

    #[test]
    fn scan_columns_drops_alias_duplicates() {
        let catalog = vec![
            CatalogColumn::new("Id", "int", false),
            CatalogColumn::new("Name", "nvarchar", true),
            CatalogColumn::new("Name", "sysname", true),
            CatalogColumn::new("Salary", "decimal", true).with_numeric(10, 2),
        ];
        let columns = scan_columns(&catalog).unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Name", "Salary"]);
        assert_eq!(columns[1].native_type, "nvarchar");
    }

    #[test]
    fn scan_columns_rejects_unsupported() {
        let catalog = vec![CatalogColumn::new("Shape", "geometry", true)];
        let err = scan_columns(&catalog).unwrap_err();
        assert_eq!(err.code, "UNSUPPORTED_TYPE");
        assert!(err.message.contains("Shape"));
    }
}
