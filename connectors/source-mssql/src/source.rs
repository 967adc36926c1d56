//! [`Source`] implementation for SQL Server.

use histload_sdk::prelude::*;

use crate::client::{connect, MssqlClient};
use crate::config::Config;
use crate::discovery::describe_table;
use crate::reader::MssqlReader;
use crate::types::scan_columns;

/// SQL Server source; opens one connection per session.
#[derive(Debug, Clone)]
pub struct MssqlSource {
    config: Config,
}

impl MssqlSource {
    /// # Errors
    ///
    /// Returns a config error if `config` fails validation.
    pub fn new(config: Config) -> Result<Self, ConnectorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Source for MssqlSource {
    type Session = MssqlSession;

    async fn open(&self) -> Result<MssqlSession, ConnectorError> {
        let client = connect(&self.config).await?;
        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            "Connected to SQL Server"
        );
        Ok(MssqlSession { client })
    }
}

pub struct MssqlSession {
    client: MssqlClient,
}

impl SourceSession for MssqlSession {
    type Reader<'a>
        = MssqlReader<'a>
    where
        Self: 'a;

    async fn catalog(&mut self, table: &TableRef) -> Result<Vec<CatalogColumn>, ConnectorError> {
        describe_table(&mut self.client, table).await
    }

    async fn extract<'a>(
        &'a mut self,
        table: &TableRef,
        chunk_size: usize,
    ) -> Result<MssqlReader<'a>, ConnectorError> {
        let catalog = describe_table(&mut self.client, table).await?;
        if catalog.is_empty() {
            return Err(ConnectorError::schema(
                "TABLE_NOT_FOUND",
                format!("table {table} not found"),
            ));
        }
        let columns = scan_columns(&catalog)?;
        MssqlReader::open(&mut self.client, table, columns, chunk_size).await
    }
}
