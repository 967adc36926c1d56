pub mod run;
pub mod schema;
pub mod store;

use std::path::Path;

use anyhow::{Context, Result};
use dest_redshift::RedshiftWarehouse;
use histload_engine::config::{parse_config, validate_config, HistoryLoadConfig};
use histload_engine::{Orchestrator, RunSettings};
use source_mssql::MssqlSource;

use self::store::StagingStore;

pub type HistoryLoader = Orchestrator<MssqlSource, RedshiftWarehouse, StagingStore>;

/// Parse and validate a history load configuration file.
pub fn load_config(path: &Path) -> Result<HistoryLoadConfig> {
    let config = parse_config(path)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Build the orchestrator for `config`. Table spans nest under the
/// returned run span.
pub async fn build_loader(config: &HistoryLoadConfig) -> Result<HistoryLoader> {
    let source_config: source_mssql::Config =
        serde_json::from_value(config.source.config.clone())
            .context("Invalid source.config section")?;
    let warehouse_config: dest_redshift::Config =
        serde_json::from_value(config.destination.config.clone())
            .context("Invalid destination.config section")?;

    let source = MssqlSource::new(source_config)?;
    let warehouse = RedshiftWarehouse::new(warehouse_config)?;
    let store = StagingStore::from_config(&config.staging).await?;

    let span = tracing::info_span!(
        "history_load",
        job = %config.job_name,
        pipeline = %config.pipeline_name(),
        service = "Glue",
    );

    Ok(Orchestrator::new(
        source,
        warehouse,
        store,
        RunSettings::from_config(config),
        span,
    ))
}
