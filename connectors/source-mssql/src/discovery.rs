//! Catalog lookup against the `sys.*` views.

use histload_sdk::catalog::{CatalogColumn, TableRef};
use histload_sdk::error::ConnectorError;
use tiberius::{Query, Row};

use crate::client::{query_error, MssqlClient};

/// Columns of one table in ordinal order. `sys.types` is joined on the
/// system type, so a column is listed once per built-in alias of its type.
const CATALOG_QUERY: &str = r"
    SELECT
        c.name AS column_name,
        t.name AS type_name,
        c.is_nullable,
        c.precision,
        c.scale
    FROM sys.tables tb
    JOIN sys.schemas s ON s.schema_id = tb.schema_id
    JOIN sys.all_columns c ON c.object_id = tb.object_id
    JOIN sys.types t ON t.system_type_id = c.system_type_id
    WHERE tb.name = @P1
        AND s.name = @P2
        AND t.is_user_defined = 0
    ORDER BY c.column_id
";

/// Describe `table`. An unknown table yields an empty list.
pub async fn describe_table(
    client: &mut MssqlClient,
    table: &TableRef,
) -> Result<Vec<CatalogColumn>, ConnectorError> {
    let mut query = Query::new(CATALOG_QUERY);
    query.bind(table.table.clone());
    query.bind(table.schema.clone());

    let rows = query
        .query(client)
        .await
        .map_err(|e| query_error("CATALOG_QUERY_FAILED", "Catalog query failed", e))?
        .into_first_result()
        .await
        .map_err(|e| query_error("CATALOG_QUERY_FAILED", "Catalog query failed", e))?;

    let columns = rows
        .iter()
        .map(catalog_column)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(table = %table, columns = columns.len(), "Described source table");
    Ok(columns)
}

fn catalog_column(row: &Row) -> Result<CatalogColumn, ConnectorError> {
    let name: &str = required(row, 0, "column_name")?;
    let type_name: &str = required(row, 1, "type_name")?;
    let nullable: bool = required(row, 2, "is_nullable")?;
    let precision: u8 = required(row, 3, "precision")?;
    let scale: u8 = required(row, 4, "scale")?;

    let column = CatalogColumn::new(name, type_name, nullable);
    Ok(match type_name.to_ascii_lowercase().as_str() {
        "decimal" | "numeric" => column.with_numeric(i64::from(precision), i64::from(scale)),
        _ => column,
    })
}

fn required<'a, R>(row: &'a Row, idx: usize, field: &str) -> Result<R, ConnectorError>
where
    R: tiberius::FromSql<'a>,
{
    row.try_get::<R, _>(idx)
        .map_err(|e| {
            ConnectorError::schema("CATALOG_ROW_INVALID", format!("catalog {field}: {e}"))
        })?
        .ok_or_else(|| {
            ConnectorError::schema("CATALOG_ROW_INVALID", format!("catalog {field} is null"))
        })
}
