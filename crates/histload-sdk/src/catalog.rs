//! Table identifiers, logical column types, and catalog metadata rows.
//!
//! A [`ColumnSchema`] is the ordered, deduplicated set of [`ColumnDef`]
//! entries a table is staged and loaded with. Catalog queries return one
//! [`CatalogColumn`] per column which a resolver maps onto a [`LogicalType`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest precision a Parquet/Arrow `Decimal128` can carry.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Column type shared by the source catalog, the Parquet staging files,
/// and the warehouse catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogicalType {
    Int16,
    Int32,
    Int64,
    Float32,
    String,
    Date,
    /// Timestamp with millisecond resolution and no time zone.
    TimestampMillis,
    Decimal {
        precision: u8,
        scale: i8,
    },
}

impl LogicalType {
    /// Decimal type with validated bounds: precision in `1..=38`, scale in
    /// `0..=precision`.
    pub fn decimal(precision: i64, scale: i64) -> Option<Self> {
        if !(1..=i64::from(MAX_DECIMAL_PRECISION)).contains(&precision) {
            return None;
        }
        if !(0..=precision).contains(&scale) {
            return None;
        }
        Some(Self::Decimal {
            precision: precision as u8,
            scale: scale as i8,
        })
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int16 => f.write_str("int16"),
            Self::Int32 => f.write_str("int32"),
            Self::Int64 => f.write_str("int64"),
            Self::Float32 => f.write_str("float32"),
            Self::String => f.write_str("string"),
            Self::Date => f.write_str("date"),
            Self::TimestampMillis => f.write_str("timestamp(ms)"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
        }
    }
}

/// One column of a resolved schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }
}

/// Ordered column definitions for one table run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    columns: Vec<ColumnDef>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// One row of catalog metadata, in catalog ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    /// Type name exactly as the catalog reports it.
    pub native_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            nullable,
            precision: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn with_numeric(mut self, precision: i64, scale: i64) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }
}
