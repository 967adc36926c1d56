//! History load YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::HistoryLoadConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// Secrets (database passwords, IAM role ARNs) reach the configuration
/// this way instead of being written into the file.
///
/// # Errors
///
/// Returns an error if any referenced environment variable is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Parse a history load YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<HistoryLoadConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: HistoryLoadConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse history load YAML")?;
    Ok(config)
}

/// Parse a history load YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<HistoryLoadConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::StoreConfig;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("HL_TEST_HOST", "mssql.example.com");
        let input = "host: ${HL_TEST_HOST}\nport: 1433";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("mssql.example.com"));
        assert!(!result.contains("${HL_TEST_HOST}"));
        std::env::remove_var("HL_TEST_HOST");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "host: localhost\nport: 1433";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_missing_env_vars_all_reported_once() {
        let input = "${HL_MISSING_X} and ${HL_MISSING_Y} and ${HL_MISSING_X}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err_msg.contains("HL_MISSING_X"));
        assert!(err_msg.contains("HL_MISSING_Y"));
        assert_eq!(err_msg.matches("HL_MISSING_X").count(), 1);
    }

    const HISTORY_YAML: &str = r#"
version: "1.0"
job_name: finance-history
source_name: Dynamics
source:
  schema: dbo
  config:
    host: localhost
    user: loader
    password: "${HL_TEST_MSSQL_PASS}"
destination:
  schema: finance
  iam_role: ${HL_TEST_IAM_ROLE}
  config:
    host: localhost
    password: "${HL_TEST_MSSQL_PASS}"
staging:
  store: s3
  bucket: ${HL_TEST_BUCKET}
tables:
  GeneralLedger:
    active_flag: T
"#;

    #[test]
    fn test_secrets_land_in_connector_config() {
        // A '#' would start a YAML comment if the value were not quoted.
        std::env::set_var("HL_TEST_MSSQL_PASS", "s3c#ret: x");
        std::env::set_var("HL_TEST_IAM_ROLE", "arn:aws:iam::1:role/copy");
        std::env::set_var("HL_TEST_BUCKET", "finance-landing");
        let config = parse_config_str(HISTORY_YAML).unwrap();
        assert_eq!(config.source.config["password"], "s3c#ret: x");
        assert_eq!(config.source.config["user"], "loader");
        assert_eq!(config.destination.config["password"], "s3c#ret: x");
        assert_eq!(config.destination.iam_role, "arn:aws:iam::1:role/copy");
        assert_eq!(
            config.staging.store,
            StoreConfig::S3 {
                bucket: "finance-landing".into(),
                region: None,
                endpoint_url: None,
            }
        );
        assert_eq!(config.tables.len(), 1);
        std::env::remove_var("HL_TEST_MSSQL_PASS");
        std::env::remove_var("HL_TEST_IAM_ROLE");
        std::env::remove_var("HL_TEST_BUCKET");
    }

    #[test]
    fn test_unset_secret_reported_before_yaml_parse() {
        let yaml = HISTORY_YAML
            .replace("HL_TEST_MSSQL_PASS", "HL_UNSET_MSSQL_PASS")
            .replace("HL_TEST_IAM_ROLE", "HL_UNSET_IAM_ROLE")
            .replace("${HL_TEST_BUCKET}", "finance-landing");
        let err = parse_config_str(&yaml).unwrap_err().to_string();
        assert_eq!(
            err,
            "Missing environment variable(s): HL_UNSET_MSSQL_PASS, HL_UNSET_IAM_ROLE"
        );
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        assert!(parse_config_str(yaml).is_err());
    }

    #[test]
    fn test_parse_missing_file_errors() {
        let err = parse_config(Path::new("/nonexistent/history.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
