use histload_sdk::error::ConnectorError;
use tiberius::error::Error as TdsError;
use tiberius::{AuthMethod, Client, Config as TdsConfig};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::Config;

/// SQL Server login failure.
const LOGIN_FAILED: u32 = 18456;

pub type MssqlClient = Client<Compat<TcpStream>>;

/// Connect to SQL Server using the provided config.
pub(crate) async fn connect(config: &Config) -> Result<MssqlClient, ConnectorError> {
    connect_inner(config).await.map_err(|e| match &e {
        TdsError::Server(token) if token.code() == LOGIN_FAILED => {
            ConnectorError::auth("LOGIN_FAILED", format!("Login failed: {e}"))
        }
        _ => ConnectorError::transient_network(
            "CONNECTION_FAILED",
            format!("Connection failed: {e}"),
        ),
    })
}

async fn connect_inner(config: &Config) -> Result<MssqlClient, TdsError> {
    let mut tds = TdsConfig::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
    if config.trust_cert {
        tds.trust_cert();
    }

    let tcp = TcpStream::connect(tds.get_addr()).await?;
    tcp.set_nodelay(true)?;

    match Client::connect(tds.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways redirect to the node that owns the database.
        Err(TdsError::Routing { host, port }) => {
            tracing::debug!(host = %host, port, "Following SQL Server routing redirect");
            tds.host(&host);
            tds.port(port);
            let tcp = TcpStream::connect(tds.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Client::connect(tds, tcp.compat_write()).await
        }
        Err(e) => Err(e),
    }
}

/// Map a query-time driver error.
pub(crate) fn query_error(code: &str, context: &str, err: TdsError) -> ConnectorError {
    match err {
        TdsError::Io { .. } => ConnectorError::transient_network(code, format!("{context}: {err}")),
        _ => ConnectorError::transient_db(code, format!("{context}: {err}")),
    }
}
