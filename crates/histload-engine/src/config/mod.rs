//! Configuration loading: YAML types, parsing, and validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_config, parse_config_str};
pub use types::{HistoryLoadConfig, LoadConfig, StagingConfig, StoreConfig, TableConfig};
pub use validator::validate_config;
