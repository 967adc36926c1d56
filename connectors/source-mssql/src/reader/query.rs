//! Full-table scan statement.

use histload_sdk::catalog::TableRef;

use crate::types::Column;

/// Bracket-quote a SQL Server identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `SELECT` every scanned column of `table`, in catalog order.
pub fn select_all(table: &TableRef, columns: &[Column]) -> String {
    let list = columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {list} FROM {}.{}",
        quote_identifier(&table.schema),
        quote_identifier(&table.table)
    )
}
