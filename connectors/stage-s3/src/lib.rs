//! Amazon S3 staging: Parquet chunks are put straight into a bucket and the
//! warehouse COPYs them from the same `s3://` location.

pub mod config;
pub mod store;

pub use config::Config;
pub use store::S3ObjectStore;
