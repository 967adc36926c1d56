//! Source SQL Server connector configuration.

use histload_sdk::error::ConnectorError;
use serde::Deserialize;

/// SQL Server connection config from the `source.config` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Accept the server certificate without validation.
    #[serde(default)]
    pub trust_cert: bool,
}

fn default_port() -> u16 {
    1433
}

impl Config {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        for (field, value) in [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(ConnectorError::config(
                    "INVALID_CONFIG",
                    format!("{field} must not be empty"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Config {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn port_defaults_to_1433() {
        let config = parse(serde_json::json!({
            "host": "sql01",
            "user": "loader",
            "database": "HR"
        }));
        assert_eq!(config.port, 1433);
        assert!(config.password.is_empty());
        assert!(!config.trust_cert);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_database_rejected() {
        let config = parse(serde_json::json!({
            "host": "sql01",
            "user": "loader",
            "database": " "
        }));
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, "INVALID_CONFIG");
        assert!(err.message.contains("database"));
    }
}
