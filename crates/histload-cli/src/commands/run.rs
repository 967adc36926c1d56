use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Result};
use histload_engine::TableOutcome;

/// Execute the `run` command: parse, validate, and load every active table.
/// Exits non-zero when any table failed.
pub async fn execute(config_path: &Path, only: &[String]) -> Result<ExitCode> {
    let config = super::load_config(config_path)?;

    let mut tables = config.table_configs();
    if !only.is_empty() {
        let unknown: Vec<&String> = only
            .iter()
            .filter(|name| !tables.iter().any(|t| &t.name == *name))
            .collect();
        if !unknown.is_empty() {
            bail!("Unknown table(s) requested: {unknown:?}");
        }
        tables.retain(|t| only.contains(&t.name));
    }

    tracing::info!(
        job = config.job_name,
        pipeline = %config.pipeline_name(),
        tables = tables.len(),
        chunk_size = config.load.chunk_size,
        "History load configured"
    );

    let loader = super::build_loader(&config).await?;
    let summary = loader.run(&tables).await;

    println!("History load '{}' finished.", config.job_name);
    for result in &summary.results {
        match result.outcome {
            TableOutcome::Succeeded => println!(
                "  {:<32} succeeded  {} rows, {} chunk(s), {:.2}s",
                result.table,
                result.affected_rows.unwrap_or_default(),
                result.chunks,
                result.duration_secs
            ),
            TableOutcome::Skipped => println!("  {:<32} skipped", result.table),
            TableOutcome::Failed => println!(
                "  {:<32} FAILED     {}",
                result.table,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!(
        "  Succeeded: {}  Failed: {}  Skipped: {}  Duration: {:.2}s",
        summary.succeeded,
        summary.failed.len(),
        summary.skipped(),
        summary.duration_secs
    );

    if summary.has_failures() {
        eprintln!("Failed tables: {}", summary.failed.join(", "));
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
