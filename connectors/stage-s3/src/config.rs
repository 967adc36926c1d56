//! S3 staging configuration.

use histload_sdk::error::ConnectorError;
use serde::Deserialize;

/// Bucket and client settings for S3 staging.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bucket: String,
    /// Overrides the AWS default region chain.
    #[serde(default)]
    pub region: Option<String>,
    /// S3-compatible endpoint, addressed path-style.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        let bucket = self.bucket.trim();
        if bucket.is_empty() {
            return Err(ConnectorError::config(
                "INVALID_CONFIG",
                "bucket must not be empty".to_string(),
            ));
        }
        if bucket.contains('/') {
            return Err(ConnectorError::config(
                "INVALID_CONFIG",
                format!("bucket '{bucket}' must be a bare name, not a path or URI"),
            ));
        }
        Ok(())
    }
}
