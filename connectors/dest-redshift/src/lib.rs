//! Redshift warehouse: catalog lookup, transactions, and statement
//! execution over the Postgres wire protocol.

pub mod client;
pub mod config;
pub mod session;

pub use config::Config;
pub use session::{RedshiftSession, RedshiftWarehouse};
