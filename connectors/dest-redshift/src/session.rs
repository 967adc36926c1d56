//! [`Warehouse`] implementation for Redshift.

use histload_sdk::prelude::*;
use tokio_postgres::{Client, Row, SimpleQueryMessage};

use crate::client::{connect, statement_error};
use crate::config::Config;

/// Columns of one table in ordinal order, matched case-insensitively.
const CATALOG_QUERY: &str = r"
    SELECT
        column_name::text,
        data_type::text,
        numeric_precision::int4,
        numeric_scale::int4,
        is_nullable::text
    FROM information_schema.columns
    WHERE LOWER(table_schema::text) = LOWER($1)
        AND LOWER(table_name::text) = LOWER($2)
    ORDER BY ordinal_position
";

/// Redshift warehouse; opens one connection per session.
#[derive(Debug, Clone)]
pub struct RedshiftWarehouse {
    config: Config,
}

impl RedshiftWarehouse {
    /// # Errors
    ///
    /// Returns a config error if `config` fails validation.
    pub fn new(config: Config) -> Result<Self, ConnectorError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Warehouse for RedshiftWarehouse {
    type Session = RedshiftSession;

    async fn open(&self) -> Result<RedshiftSession, ConnectorError> {
        let client = connect(&self.config).await?;
        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            "Connected to Redshift"
        );
        Ok(RedshiftSession { client })
    }
}

pub struct RedshiftSession {
    client: Client,
}

impl RedshiftSession {
    async fn simple(
        &self,
        code: &str,
        sql: &str,
    ) -> Result<Vec<SimpleQueryMessage>, ConnectorError> {
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| statement_error(code, &e))
    }
}

impl WarehouseSession for RedshiftSession {
    async fn catalog(&mut self, table: &TableRef) -> Result<Vec<CatalogColumn>, ConnectorError> {
        let rows = self
            .client
            .query(CATALOG_QUERY, &[&table.schema, &table.table])
            .await
            .map_err(|e| statement_error("CATALOG_QUERY_FAILED", &e))?;
        let columns = rows
            .iter()
            .map(catalog_column)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(table = %table, columns = columns.len(), "Described warehouse table");
        Ok(columns)
    }

    async fn begin(&mut self) -> Result<(), ConnectorError> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| statement_error("BEGIN_FAILED", &e))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, ConnectorError> {
        let messages = self.simple("EXECUTE_FAILED", sql).await?;
        Ok(affected_rows(&messages))
    }

    async fn query_count(&mut self, sql: &str) -> Result<i64, ConnectorError> {
        let messages = self.simple("QUERY_FAILED", sql).await?;
        first_count(&messages)
    }

    async fn commit(&mut self) -> Result<(), ConnectorError> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| statement_error("COMMIT_FAILED", &e))
    }

    async fn rollback(&mut self) -> Result<(), ConnectorError> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| statement_error("ROLLBACK_FAILED", &e))
    }
}

fn catalog_column(row: &Row) -> Result<CatalogColumn, ConnectorError> {
    let invalid = |e: tokio_postgres::Error| {
        ConnectorError::schema("CATALOG_ROW_INVALID", format!("catalog row: {e}"))
    };
    let name: String = row.try_get(0).map_err(invalid)?;
    let data_type: String = row.try_get(1).map_err(invalid)?;
    let precision: Option<i32> = row.try_get(2).map_err(invalid)?;
    let scale: Option<i32> = row.try_get(3).map_err(invalid)?;
    let is_nullable: String = row.try_get(4).map_err(invalid)?;

    let nullable = is_nullable.eq_ignore_ascii_case("YES");
    let mut column = CatalogColumn::new(name, data_type, nullable);
    column.precision = precision.map(i64::from);
    column.scale = scale.map(i64::from);
    Ok(column)
}

/// Rows reported by the last command in a simple-query exchange.
fn affected_rows(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::CommandComplete(n) => Some(*n),
            _ => None,
        })
        .last()
        .unwrap_or(0)
}

fn first_count(messages: &[SimpleQueryMessage]) -> Result<i64, ConnectorError> {
    let cell = messages.iter().find_map(|m| match m {
        SimpleQueryMessage::Row(row) => Some(row.try_get(0).ok().flatten()),
        _ => None,
    });
    match cell {
        Some(Some(text)) => text.trim().parse::<i64>().map_err(|e| {
            ConnectorError::data(
                "COUNT_NOT_INTEGER",
                format!("count '{text}' is not an integer: {e}"),
            )
        }),
        Some(None) => Err(ConnectorError::data("COUNT_NULL", "count query returned NULL")),
        None => Err(ConnectorError::data("COUNT_MISSING", "count query returned no rows")),
    }
}
