//! SQL Server source: catalog discovery over `sys.*` views and streamed
//! full-table scans encoded into Arrow batches.

pub mod client;
pub mod config;
pub mod discovery;
pub mod reader;
pub mod source;
pub mod types;

pub use config::Config;
pub use source::{MssqlSession, MssqlSource};
