//! Semantic validation for a parsed history load configuration.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::config::types::{HistoryLoadConfig, StoreConfig};

/// Validate a parsed configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing every validation failure found in the config.
pub fn validate_config(config: &HistoryLoadConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.job_name.trim().is_empty() {
        errors.push("job_name must not be empty".to_string());
    }

    if config.source_name.trim().is_empty() {
        errors.push("source_name must not be empty".to_string());
    }

    if config.source.schema.trim().is_empty() {
        errors.push("source.schema must not be empty".to_string());
    }

    if config.destination.schema.trim().is_empty() {
        errors.push("destination.schema must not be empty".to_string());
    }

    if config.destination.iam_role.trim().is_empty() {
        errors.push("destination.iam_role must not be empty".to_string());
    }

    match &config.staging.store {
        StoreConfig::S3 { bucket, .. } => {
            if bucket.trim().is_empty() {
                errors.push("staging.bucket must not be empty".to_string());
            }
        }
        StoreConfig::Local { uri_base, .. } => {
            if uri_base.trim().is_empty() {
                errors.push("staging.uri_base must not be empty".to_string());
            }
        }
    }

    if config.staging.landing_prefix.starts_with('/') {
        errors.push(format!(
            "staging.landing_prefix '{}' must be relative",
            config.staging.landing_prefix
        ));
    }

    if config.load.chunk_size == 0 {
        errors.push("load.chunk_size must be at least 1".to_string());
    }

    if config.tables.is_empty() {
        errors.push("At least one table must be configured".to_string());
    }

    let mut seen = HashSet::new();
    for (i, entry) in config.tables.iter().enumerate() {
        if entry.name.trim().is_empty() {
            errors.push(format!("Table {i} has an empty name"));
            continue;
        }
        if !seen.insert(entry.name.to_ascii_lowercase()) {
            errors.push(format!("Table '{}' is configured more than once", entry.name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Config validation failed:\n  - {}", errors.join("\n  - "))
    }
}
