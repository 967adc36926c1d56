//! Column schema resolution from catalog metadata.
//!
//! Source-driven tables take their schema from the SQL Server catalog,
//! destination-driven tables from the warehouse catalog. Both get the four
//! audit columns appended.

use std::collections::{HashMap, HashSet};

use histload_sdk::catalog::{CatalogColumn, ColumnDef, ColumnSchema, LogicalType, TableRef};

use crate::errors::TableError;
use crate::type_map::{map_column, CatalogDialect};

pub const ROW_HASH_COLUMN: &str = "row_hash_code";
pub const UPDATED_BY_COLUMN: &str = "updatedby";
pub const UPDATED_TS_COLUMN: &str = "updated_utc_ts";
pub const RUN_ID_COLUMN: &str = "runid";

/// Trailing lineage columns present in every staged file.
pub fn audit_columns() -> [ColumnDef; 4] {
    [
        ColumnDef::new(ROW_HASH_COLUMN, LogicalType::String, true),
        ColumnDef::new(UPDATED_BY_COLUMN, LogicalType::String, true),
        ColumnDef::new(UPDATED_TS_COLUMN, LogicalType::TimestampMillis, true),
        ColumnDef::new(RUN_ID_COLUMN, LogicalType::Int32, true),
    ]
}

pub fn is_audit_column(name: &str) -> bool {
    matches!(
        name,
        ROW_HASH_COLUMN | UPDATED_BY_COLUMN | UPDATED_TS_COLUMN | RUN_ID_COLUMN
    )
}

/// Where a table's schema is inferred from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Source catalog; column names kept as-is.
    Source,
    /// Warehouse catalog; column names lower-cased, batch names normalized.
    Destination,
}

impl SchemaMode {
    pub fn from_flag(destination_schema_mode: bool) -> Self {
        if destination_schema_mode {
            Self::Destination
        } else {
            Self::Source
        }
    }

    pub fn dialect(self) -> CatalogDialect {
        match self {
            Self::Source => CatalogDialect::SqlServer,
            Self::Destination => CatalogDialect::Redshift,
        }
    }
}

/// Build the ordered, deduplicated column schema for `table` from catalog
/// rows already in ordinal order.
///
/// # Errors
///
/// Fails when the catalog is empty, a type is unmapped or out of bounds, or
/// one column name carries two different definitions.
pub fn resolve_schema(
    mode: SchemaMode,
    table: &TableRef,
    catalog: &[CatalogColumn],
) -> Result<ColumnSchema, TableError> {
    if catalog.is_empty() {
        return Err(TableError::SchemaResolution(format!(
            "table {table} not found in {} catalog",
            mode.dialect().as_str()
        )));
    }

    let mut columns = Vec::with_capacity(catalog.len() + 4);
    for entry in catalog {
        let logical_type = map_column(mode.dialect(), entry).map_err(|e| {
            TableError::SchemaResolution(format!("{table}: column '{}': {e}", entry.name))
        })?;
        let name = match mode {
            SchemaMode::Source => entry.name.clone(),
            SchemaMode::Destination => entry.name.to_lowercase(),
        };
        columns.push(ColumnDef::new(name, logical_type, entry.nullable));
    }
    columns.extend(audit_columns());

    dedup_columns(table, columns).map(ColumnSchema::new)
}

/// Drop repeated identical definitions, keeping first occurrence order.
fn dedup_columns(table: &TableRef, columns: Vec<ColumnDef>) -> Result<Vec<ColumnDef>, TableError> {
    let mut seen: HashSet<ColumnDef> = HashSet::new();
    let mut by_name: HashMap<String, ColumnDef> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());

    for column in columns {
        if seen.contains(&column) {
            continue;
        }
        if let Some(existing) = by_name.get(&column.name) {
            return Err(TableError::SchemaResolution(format!(
                "{table}: column '{}' defined twice ({} nullable={} vs {} nullable={})",
                column.name,
                existing.logical_type,
                existing.nullable,
                column.logical_type,
                column.nullable
            )));
        }
        seen.insert(column.clone());
        by_name.insert(column.name.clone(), column.clone());
        out.push(column);
    }
    Ok(out)
}
