//! Streamed full-table scans cut into fixed-size Arrow batches.

pub mod arrow_encode;
pub mod query;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use histload_sdk::catalog::TableRef;
use histload_sdk::connector::ChunkReader;
use histload_sdk::error::ConnectorError;
use tiberius::Row;

use crate::client::{query_error, MssqlClient};
use crate::types::Column;
use arrow_encode::{scan_schema, BatchBuilder};

/// Upper bound on rows preallocated per column builder.
const MAX_PREALLOCATED_ROWS: usize = 64 * 1024;

/// Reader over one `SELECT`. Rows are pulled from the driver only as each
/// chunk is built, so at most one chunk is held in memory.
pub struct MssqlReader<'a> {
    rows: BoxStream<'a, tiberius::Result<Row>>,
    columns: Vec<Column>,
    schema: SchemaRef,
    chunk_size: usize,
    emitted: u32,
    exhausted: bool,
}

impl<'a> MssqlReader<'a> {
    pub(crate) async fn open(
        client: &'a mut MssqlClient,
        table: &TableRef,
        columns: Vec<Column>,
        chunk_size: usize,
    ) -> Result<Self, ConnectorError> {
        let sql = query::select_all(table, &columns);
        tracing::debug!(table = %table, query = %sql, "Starting full-table scan");
        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| query_error("SCAN_FAILED", "Full-table scan failed", e))?;

        Ok(Self {
            rows: stream.into_row_stream(),
            schema: scan_schema(&columns),
            columns,
            chunk_size,
            emitted: 0,
            exhausted: false,
        })
    }
}

impl ChunkReader for MssqlReader<'_> {
    async fn next_chunk(&mut self) -> Result<Option<RecordBatch>, ConnectorError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut batch = BatchBuilder::new(
            &self.columns,
            self.chunk_size.min(MAX_PREALLOCATED_ROWS),
        );
        while batch.len() < self.chunk_size {
            let next = self
                .rows
                .try_next()
                .await
                .map_err(|e| query_error("FETCH_FAILED", "Row fetch failed", e))?;
            match next {
                Some(row) => batch
                    .push_row(row)
                    .map_err(|e| ConnectorError::data("ENCODE_FAILED", e))?,
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        // An empty table still produces one (empty) batch.
        if batch.is_empty() && self.emitted > 0 {
            return Ok(None);
        }

        let rows = batch.len();
        let record_batch = batch.finish(&self.schema).map_err(|e| {
            ConnectorError::internal("BATCH_BUILD_FAILED", format!("Arrow batch build failed: {e}"))
        })?;
        self.emitted += 1;
        tracing::debug!(chunk = self.emitted, rows, "Fetched chunk");
        Ok(Some(record_batch))
    }
}
