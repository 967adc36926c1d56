//! Async collaborator traits the load pipeline is generic over.
//!
//! Every remote system sits behind one of these: a relational [`Source`],
//! a [`Warehouse`], and an [`ObjectStore`]. Sessions are opened per table
//! and dropped when that table finishes.

use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use crate::catalog::{CatalogColumn, TableRef};
use crate::error::ConnectorError;

/// Relational source the history load extracts from.
#[allow(async_fn_in_trait)]
pub trait Source {
    type Session: SourceSession;

    /// Open a fresh connection.
    async fn open(&self) -> Result<Self::Session, ConnectorError>;
}

/// One open source connection.
#[allow(async_fn_in_trait)]
pub trait SourceSession {
    type Reader<'a>: ChunkReader
    where
        Self: 'a;

    /// Catalog metadata for `table`, one entry per column in ordinal order.
    /// An unknown table yields an empty list.
    async fn catalog(&mut self, table: &TableRef) -> Result<Vec<CatalogColumn>, ConnectorError>;

    /// Start a full-table scan returning batches of at most `chunk_size` rows.
    async fn extract<'a>(
        &'a mut self,
        table: &TableRef,
        chunk_size: usize,
    ) -> Result<Self::Reader<'a>, ConnectorError>;
}

/// Single-pass, finite sequence of row batches.
///
/// Every batch holds exactly the configured chunk size except possibly the
/// last. An empty table yields one empty batch before `None`.
#[allow(async_fn_in_trait)]
pub trait ChunkReader {
    async fn next_chunk(&mut self) -> Result<Option<RecordBatch>, ConnectorError>;
}

/// Warehouse the staged files are bulk-loaded into.
#[allow(async_fn_in_trait)]
pub trait Warehouse {
    type Session: WarehouseSession;

    async fn open(&self) -> Result<Self::Session, ConnectorError>;
}

/// One open warehouse connection with explicit transaction control.
#[allow(async_fn_in_trait)]
pub trait WarehouseSession {
    /// Catalog metadata for `table`, matched case-insensitively, in ordinal
    /// order.
    async fn catalog(&mut self, table: &TableRef) -> Result<Vec<CatalogColumn>, ConnectorError>;

    async fn begin(&mut self) -> Result<(), ConnectorError>;

    /// Execute a statement, returning the affected-row count it reports.
    async fn execute(&mut self, sql: &str) -> Result<u64, ConnectorError>;

    /// Run a query returning a single integer cell.
    async fn query_count(&mut self, sql: &str) -> Result<i64, ConnectorError>;

    async fn commit(&mut self) -> Result<(), ConnectorError>;

    async fn rollback(&mut self) -> Result<(), ConnectorError>;
}

/// Write-only object storage for staged Parquet blocks.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Store `body` under `key`, replacing any previous object.
    async fn put(&self, key: &str, body: Bytes) -> Result<(), ConnectorError>;

    /// URI the warehouse uses to address every object below `prefix`.
    fn uri_for(&self, prefix: &str) -> String;
}
