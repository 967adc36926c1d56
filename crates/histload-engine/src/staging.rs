//! Partitioned object keys and the staging writer.
//!
//! All chunks of one table run land under a single hour partition:
//! `<landing-prefix>/<table>/<YYYY>/<MM>/<DD>/<HH>/<table>_<chunk>.parquet`.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use histload_sdk::connector::ObjectStore;
use histload_sdk::error::ConnectorError;

use crate::errors::TableError;

/// Key prefix (with trailing `/`) shared by every chunk of `table` staged
/// during the hour containing `at`.
pub fn partition_prefix(landing_prefix: &str, table: &str, at: DateTime<Utc>) -> String {
    let landing = landing_prefix.trim_matches('/');
    let hour = at.format("%Y/%m/%d/%H");
    if landing.is_empty() {
        format!("{table}/{hour}/")
    } else {
        format!("{landing}/{table}/{hour}/")
    }
}

/// Key of chunk `chunk` (1-based) below `prefix`.
pub fn chunk_key(prefix: &str, table: &str, chunk: u32) -> String {
    format!("{prefix}{table}_{chunk}.parquet")
}

/// Writes the numbered chunks of one table run into one partition.
pub struct ObjectWriter<'a, S: ObjectStore> {
    store: &'a S,
    table: String,
    prefix: String,
    chunks_written: u32,
}

impl<'a, S: ObjectStore> ObjectWriter<'a, S> {
    /// Fix the partition for this table run. Called once per table.
    pub fn new(store: &'a S, landing_prefix: &str, table: &str, at: DateTime<Utc>) -> Self {
        Self {
            store,
            table: table.to_string(),
            prefix: partition_prefix(landing_prefix, table, at),
            chunks_written: 0,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn chunks_written(&self) -> u32 {
        self.chunks_written
    }

    /// URI the bulk load reads every chunk of this partition from.
    pub fn partition_uri(&self) -> String {
        self.store.uri_for(&self.prefix)
    }

    /// Put the next chunk and return its key. Numbering only advances on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Write`] if the store rejects the object.
    pub async fn write_chunk(&mut self, body: Bytes) -> Result<String, TableError> {
        let chunk = self.chunks_written + 1;
        let key = chunk_key(&self.prefix, &self.table, chunk);
        let size = body.len();
        self.store.put(&key, body).await.map_err(TableError::write)?;
        self.chunks_written = chunk;
        tracing::debug!(key = %key, chunk, bytes = size, "Staged chunk");
        Ok(key)
    }
}

/// Filesystem-backed object store, e.g. a mounted bucket.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    uri_base: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, uri_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            uri_base: uri_base.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ConnectorError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(ConnectorError::storage(
                "INVALID_KEY",
                format!("object key '{key}' must be a relative path"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), ConnectorError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ConnectorError::storage(
                    "CREATE_DIR_FAILED",
                    format!("{}: {e}", parent.display()),
                )
            })?;
        }
        tokio::fs::write(&path, &body).await.map_err(|e| {
            ConnectorError::storage("PUT_FAILED", format!("{}: {e}", path.display()))
        })
    }

    fn uri_for(&self, prefix: &str) -> String {
        format!("{}/{}", self.uri_base.trim_end_matches('/'), prefix)
    }
}
