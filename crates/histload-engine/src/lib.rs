//! Full-table history load: extract from a relational source, coerce,
//! stage as Parquet, and bulk-load into a warehouse, one table at a time.

pub mod coerce;
pub mod config;
pub mod errors;
pub mod extract;
pub(crate) mod failure_log;
pub mod loader;
pub mod orchestrator;
pub mod result;
pub mod schema;
pub mod serialize;
pub mod staging;
pub mod type_map;

// Re-export public API for convenience
pub use errors::TableError;
pub use orchestrator::{Orchestrator, RunSettings};
pub use result::{LoadResult, RunSummary, TableOutcome};
pub use staging::LocalObjectStore;
