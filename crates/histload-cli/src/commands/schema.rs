use std::path::Path;

use anyhow::{anyhow, Result};

/// Execute the `schema` command: resolve and print one table's column
/// schema, including the audit columns, without moving data.
pub async fn execute(config_path: &Path, table_name: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let table = config
        .table_configs()
        .into_iter()
        .find(|t| t.name == table_name)
        .ok_or_else(|| anyhow!("Table '{table_name}' is not in the configuration"))?;

    let loader = super::build_loader(&config).await?;
    let schema = loader.describe(&table).await?;

    let mode = if table.destination_schema_mode {
        "destination"
    } else {
        "source"
    };
    println!("{} ({mode} schema, {} columns)", table.destination, schema.len());
    for column in schema.columns() {
        println!(
            "  {:<40} {:<16} {}",
            column.name,
            column.logical_type.to_string(),
            if column.nullable { "NULL" } else { "NOT NULL" }
        );
    }
    Ok(())
}
