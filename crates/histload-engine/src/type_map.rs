//! Catalog type name -> [`LogicalType`] mapping per catalog dialect.

use histload_sdk::catalog::{CatalogColumn, LogicalType};

/// Catalog a column description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogDialect {
    /// SQL Server `sys.types` names.
    SqlServer,
    /// Redshift `information_schema.columns.data_type` names.
    Redshift,
}

impl CatalogDialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::Redshift => "redshift",
        }
    }
}

/// Reason a catalog column could not be mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    UnknownType(String),
    MissingPrecision(String),
    InvalidDecimal { precision: i64, scale: i64 },
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unmapped type '{t}'"),
            Self::MissingPrecision(t) => write!(f, "type '{t}' reported no precision/scale"),
            Self::InvalidDecimal { precision, scale } => {
                write!(f, "invalid decimal({precision},{scale})")
            }
        }
    }
}

/// Map one catalog column to its logical type.
pub fn map_column(
    dialect: CatalogDialect,
    column: &CatalogColumn,
) -> Result<LogicalType, MappingError> {
    let native = column.native_type.trim().to_ascii_lowercase();
    match dialect {
        CatalogDialect::SqlServer => map_sqlserver(&native, column),
        CatalogDialect::Redshift => map_redshift(&native, column),
    }
}

fn map_sqlserver(native: &str, column: &CatalogColumn) -> Result<LogicalType, MappingError> {
    let logical = match native {
        "bigint" => LogicalType::Int64,
        "int" | "integer" => LogicalType::Int32,
        "smallint" | "tinyint" | "bit" | "boolean" => LogicalType::Int16,
        "decimal" | "numeric" => declared_decimal(native, column)?,
        "money" => fixed_decimal(19, 4),
        "smallmoney" => fixed_decimal(10, 4),
        "float" | "real" => LogicalType::Float32,
        "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" | "sysname"
        | "uniqueidentifier" | "timestamp" | "rowversion" | "xml" => LogicalType::String,
        "date" => LogicalType::Date,
        "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "time" => {
            LogicalType::TimestampMillis
        }
        other => return Err(MappingError::UnknownType(other.to_string())),
    };
    Ok(logical)
}

fn map_redshift(native: &str, column: &CatalogColumn) -> Result<LogicalType, MappingError> {
    let logical = match native {
        "bigint" | "int8" => LogicalType::Int64,
        "integer" | "int" | "int4" => LogicalType::Int32,
        "smallint" | "int2" | "boolean" | "bool" => LogicalType::Int16,
        "numeric" | "decimal" => declared_decimal(native, column)?,
        "double precision" | "float8" | "float" => match (column.precision, column.scale) {
            (Some(precision), Some(scale)) => decimal_or_err(precision, scale)?,
            _ => LogicalType::Float32,
        },
        "real" | "float4" => LogicalType::Float32,
        "character varying" | "varchar" | "character" | "char" | "bpchar" | "nchar"
        | "nvarchar" | "text" => LogicalType::String,
        "date" => LogicalType::Date,
        "timestamp without time zone"
        | "timestamp"
        | "timestamp with time zone"
        | "timestamptz" => LogicalType::TimestampMillis,
        other => return Err(MappingError::UnknownType(other.to_string())),
    };
    Ok(logical)
}

fn declared_decimal(native: &str, column: &CatalogColumn) -> Result<LogicalType, MappingError> {
    match (column.precision, column.scale) {
        (Some(precision), Some(scale)) => decimal_or_err(precision, scale),
        _ => Err(MappingError::MissingPrecision(native.to_string())),
    }
}

fn decimal_or_err(precision: i64, scale: i64) -> Result<LogicalType, MappingError> {
    LogicalType::decimal(precision, scale)
        .ok_or(MappingError::InvalidDecimal { precision, scale })
}

fn fixed_decimal(precision: u8, scale: i8) -> LogicalType {
    LogicalType::Decimal { precision, scale }
}
