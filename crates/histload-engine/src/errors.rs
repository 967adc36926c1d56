//! Per-table error model.
//!
//! Every stage of the table pipeline fails with a [`TableError`]. The
//! orchestrator records it against the table and moves on; nothing is
//! retried.

use histload_sdk::error::ConnectorError;

/// Fatal error for a single table run, tagged with the stage that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Catalog lookup or type mapping failed.
    #[error("schema resolution failed: {0}")]
    SchemaResolution(String),
    /// Reading rows from the source failed.
    #[error("extraction failed: {0}")]
    Extraction(String),
    /// A column could not be brought into its resolved type.
    #[error("coercion failed: {0}")]
    Coercion(String),
    /// The batch does not match the schema or Parquet encoding failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Staging a Parquet block in object storage failed.
    #[error("write failed: {0}")]
    Write(String),
    /// Truncate, COPY, or commit in the warehouse failed.
    #[error("load failed: {0}")]
    Load(String),
}

impl TableError {
    /// Stage name used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::SchemaResolution(_) => "schema_resolution",
            Self::Extraction(_) => "extraction",
            Self::Coercion(_) => "coercion",
            Self::Serialization(_) => "serialization",
            Self::Write(_) => "write",
            Self::Load(_) => "load",
        }
    }

    pub(crate) fn schema(err: ConnectorError) -> Self {
        Self::SchemaResolution(err.to_string())
    }

    pub(crate) fn extraction(err: ConnectorError) -> Self {
        Self::Extraction(err.to_string())
    }

    pub(crate) fn write(err: ConnectorError) -> Self {
        Self::Write(err.to_string())
    }

    pub(crate) fn load(err: ConnectorError) -> Self {
        Self::Load(err.to_string())
    }
}
