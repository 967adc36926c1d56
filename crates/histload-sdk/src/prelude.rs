//! Convenience re-exports for collaborator implementations.
//!
//! ```ignore
//! use histload_sdk::prelude::*;
//! ```

// Collaborator traits
pub use crate::connector::{
    ChunkReader, ObjectStore, Source, SourceSession, Warehouse, WarehouseSession,
};

// Errors
pub use crate::error::{ConnectorError, ErrorCategory};

// Catalog and schema types
pub use crate::catalog::{CatalogColumn, ColumnDef, ColumnSchema, LogicalType, TableRef};

// Arrow helpers
pub use crate::arrow::{arrow_data_type, build_arrow_schema};
