//! Redshift client connection.

use histload_sdk::error::ConnectorError;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use crate::config::Config;

/// Connect to Redshift using the provided config.
pub(crate) async fn connect(config: &Config) -> Result<Client, ConnectorError> {
    let mut pg = PgConfig::new();
    pg.host(&config.host);
    pg.port(config.port);
    pg.user(&config.user);
    if !config.password.is_empty() {
        pg.password(&config.password);
    }
    pg.dbname(&config.database);

    let (client, connection) = pg.connect(NoTls).await.map_err(|e| {
        if e.code() == Some(&SqlState::INVALID_PASSWORD) {
            ConnectorError::auth("AUTH_FAILED", format!("Authentication failed: {e}"))
        } else {
            ConnectorError::transient_network(
                "CONNECTION_FAILED",
                format!("Connection failed: {e}"),
            )
        }
    })?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "Redshift connection error");
        }
    });

    Ok(client)
}

/// Map a statement-time driver error.
pub(crate) fn statement_error(code: &str, err: &tokio_postgres::Error) -> ConnectorError {
    if err.is_closed() {
        ConnectorError::transient_network(code, format!("Connection closed: {err}"))
    } else {
        let message = match err.as_db_error() {
            Some(db) => format!("{}: {}", db.code().code(), db.message()),
            None => err.to_string(),
        };
        ConnectorError::transient_db(code, message)
    }
}
