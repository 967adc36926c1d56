//! Run orchestration: iterate configured tables, drive the per-table
//! extract -> coerce -> serialize -> stage -> load pipeline, and isolate
//! failures so one table never stops the rest.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use histload_sdk::catalog::{CatalogColumn, ColumnSchema};
use histload_sdk::connector::{ObjectStore, Source, SourceSession, Warehouse, WarehouseSession};
use tracing::Instrument;

use crate::coerce::{CoercionOptions, CoercionPlan};
use crate::config::{HistoryLoadConfig, TableConfig};
use crate::errors::TableError;
use crate::extract::ChunkExtractor;
use crate::failure_log::FailureLog;
use crate::loader::{BulkLoader, LoadStatus};
use crate::result::{LoadResult, RunSummary, TableOutcome};
use crate::schema::{resolve_schema, SchemaMode};
use crate::serialize::to_parquet;
use crate::staging::ObjectWriter;

/// Per-chunk run ids for one table run: -1, -2, -3, ...
#[derive(Debug)]
pub struct RunIdSequence {
    next: i32,
}

impl RunIdSequence {
    pub fn new() -> Self {
        Self { next: -1 }
    }

    pub fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.next -= 1;
        id
    }
}

impl Default for RunIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Run-wide settings, fixed for every table.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub job_name: String,
    pub landing_prefix: String,
    pub chunk_size: usize,
    pub iam_role: String,
    pub coercion: CoercionOptions,
    /// Append-only failure log; `None` disables it.
    pub failure_log: Option<PathBuf>,
}

impl RunSettings {
    pub fn from_config(config: &HistoryLoadConfig) -> Self {
        Self {
            job_name: config.job_name.clone(),
            landing_prefix: config.staging.landing_prefix.clone(),
            chunk_size: config.load.chunk_size,
            iam_role: config.destination.iam_role.clone(),
            coercion: CoercionOptions {
                service_identity: config.load.service_identity.clone(),
                date_exemptions: config.load.date_exemptions.clone(),
            },
            failure_log: Some(config.load.failure_log.clone()),
        }
    }
}

/// Drives a history load over a source, a warehouse, and an object store.
pub struct Orchestrator<S, W, O> {
    source: S,
    warehouse: W,
    store: O,
    settings: RunSettings,
    loader: BulkLoader,
    span: tracing::Span,
    clock: fn() -> DateTime<Utc>,
}

impl<S, W, O> Orchestrator<S, W, O>
where
    S: Source,
    W: Warehouse,
    O: ObjectStore,
{
    /// Every table span is created as a child of `span`.
    pub fn new(
        source: S,
        warehouse: W,
        store: O,
        settings: RunSettings,
        span: tracing::Span,
    ) -> Self {
        let loader = BulkLoader::new(settings.iam_role.clone());
        Self {
            source,
            warehouse,
            store,
            settings,
            loader,
            span,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for partitions, audit timestamps, and the
    /// failure log header.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    /// Process `tables` in order and return the aggregate outcome.
    pub async fn run(&self, tables: &[TableConfig]) -> RunSummary {
        let run_started = (self.clock)();
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut failure_log = self
            .settings
            .failure_log
            .as_deref()
            .map(|path| FailureLog::start(path, &self.settings.job_name, run_started));

        for table in tables {
            if !table.active {
                tracing::info!(parent: &self.span, table = %table.name, "Skipping inactive table");
                summary.record(LoadResult::skipped(&table.name));
                continue;
            }

            let span = tracing::info_span!(parent: &self.span, "table", table = %table.name);
            let result = self.run_table(table).instrument(span).await;
            if let (Some(log), Some(error)) = (failure_log.as_mut(), result.error.as_deref()) {
                log.record(&result.table, error);
            }
            summary.record(result);
        }

        summary.duration_secs = started.elapsed().as_secs_f64();

        if let Some(log) = failure_log {
            log.finish();
        }

        self.span.in_scope(|| {
            tracing::info!(
                succeeded = summary.succeeded,
                failed = summary.failed.len(),
                skipped = summary.skipped(),
                duration_secs = summary.duration_secs,
                "History load finished"
            );
            if summary.has_failures() {
                tracing::warn!(failed_tables = ?summary.failed, "Some tables failed");
            }
        });

        summary
    }

    /// Resolve a table's column schema without moving any data.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if a session cannot be opened or the schema
    /// cannot be resolved.
    pub async fn describe(&self, table: &TableConfig) -> Result<ColumnSchema, TableError> {
        let mut source = self.source.open().await.map_err(TableError::extraction)?;
        let mut warehouse = self.warehouse.open().await.map_err(TableError::load)?;
        let (schema, _) = resolve(&mut source, &mut warehouse, table).await?;
        Ok(schema)
    }

    async fn run_table(&self, table: &TableConfig) -> LoadResult {
        let started = Instant::now();
        let mut chunks = 0;
        let outcome = self.load_table(table, &mut chunks).await;
        let duration_secs = started.elapsed().as_secs_f64();

        match outcome {
            Ok(status) => {
                tracing::info!(
                    table = %table.name,
                    chunks,
                    affected_rows = status.affected_rows,
                    duration_secs,
                    "Table loaded"
                );
                LoadResult {
                    table: table.name.clone(),
                    outcome: TableOutcome::Succeeded,
                    affected_rows: Some(status.affected_rows),
                    error: None,
                    chunks,
                    duration_secs,
                }
            }
            Err(err) => {
                tracing::error!(
                    table = %table.name,
                    stage = err.stage(),
                    chunks,
                    error = %err,
                    "Table failed"
                );
                LoadResult {
                    table: table.name.clone(),
                    outcome: TableOutcome::Failed,
                    affected_rows: None,
                    error: Some(err.to_string()),
                    chunks,
                    duration_secs,
                }
            }
        }
    }

    async fn load_table(
        &self,
        table: &TableConfig,
        chunks: &mut u32,
    ) -> Result<LoadStatus, TableError> {
        let mut source = self.source.open().await.map_err(TableError::extraction)?;
        let mut warehouse = self.warehouse.open().await.map_err(TableError::load)?;

        let (schema, source_catalog) = resolve(&mut source, &mut warehouse, table).await?;
        let mode = SchemaMode::from_flag(table.destination_schema_mode);
        let plan = CoercionPlan::from_catalog(&source_catalog, mode, &self.settings.coercion);
        tracing::debug!(columns = schema.len(), mode = ?mode, "Resolved schema");

        let mut writer = ObjectWriter::new(
            &self.store,
            &self.settings.landing_prefix,
            &table.name,
            (self.clock)(),
        );
        let mut run_ids = RunIdSequence::new();

        {
            let reader = source
                .extract(&table.source, self.settings.chunk_size)
                .await
                .map_err(TableError::extraction)?;
            let mut extractor = ChunkExtractor::new(reader, self.settings.chunk_size);

            while let Some(chunk) = extractor.next_chunk().await? {
                let run_id = run_ids.next_id();
                let rows = chunk.batch.num_rows();
                let coerced = plan.coerce(&chunk.batch, &schema, run_id, (self.clock)())?;
                let body = to_parquet(&coerced, &schema)?;
                let key = writer.write_chunk(body).await?;
                *chunks = writer.chunks_written();
                tracing::info!(chunk = chunk.number, rows, run_id, key = %key, "Chunk staged");
            }
        }

        let uri = writer.partition_uri();
        self.loader
            .load(&mut warehouse, &table.destination, &uri)
            .await
    }
}

/// Resolve the schema for `table` plus the source catalog its coercion
/// plan is derived from.
async fn resolve<SS, WS>(
    source: &mut SS,
    warehouse: &mut WS,
    table: &TableConfig,
) -> Result<(ColumnSchema, Vec<CatalogColumn>), TableError>
where
    SS: SourceSession,
    WS: WarehouseSession,
{
    let source_catalog = source
        .catalog(&table.source)
        .await
        .map_err(TableError::schema)?;

    let schema = match SchemaMode::from_flag(table.destination_schema_mode) {
        SchemaMode::Source => resolve_schema(SchemaMode::Source, &table.source, &source_catalog)?,
        SchemaMode::Destination => {
            if source_catalog.is_empty() {
                return Err(TableError::SchemaResolution(format!(
                    "table {} not found in source catalog",
                    table.source
                )));
            }
            let catalog = warehouse
                .catalog(&table.destination)
                .await
                .map_err(TableError::schema)?;
            resolve_schema(SchemaMode::Destination, &table.destination, &catalog)?
        }
    };
    Ok((schema, source_catalog))
}
