//! Redshift connector configuration.

use histload_sdk::error::ConnectorError;
use serde::Deserialize;

/// Redshift connection config from the `destination.config` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

fn default_port() -> u16 {
    5439
}

impl Config {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::config(
                "INVALID_CONFIG",
                "host must not be empty".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(ConnectorError::config(
                "INVALID_CONFIG",
                "database must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_to_5439() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "host": "cluster.example.internal",
            "user": "loader",
            "password": "secret",
            "database": "dw"
        }))
        .unwrap();
        assert_eq!(config.port, 5439);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_host_rejected() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "host": "",
            "user": "loader",
            "database": "dw"
        }))
        .unwrap();
        assert_eq!(config.validate().unwrap_err().code, "INVALID_CONFIG");
    }
}
