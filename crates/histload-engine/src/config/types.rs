//! History load YAML configuration types.

use std::fmt;
use std::path::PathBuf;

use histload_sdk::catalog::TableRef;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of rows per extracted chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Default value of the `updatedby` audit column.
pub const DEFAULT_SERVICE_IDENTITY: &str = "redshiftadmin";

/// Date columns left untouched by date coercion unless overridden.
pub const DEFAULT_DATE_EXEMPTIONS: [&str; 3] =
    ["LastDayofWork", "LastDayofLeaveActual", "FirstDayBackatWork"];

/// Top-level history load configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryLoadConfig {
    pub version: String,
    pub job_name: String,
    /// Upstream system name, used to tag the run (`<source_name>-HistoryLoad`).
    pub source_name: String,
    pub source: SourceSection,
    pub destination: DestinationSection,
    pub staging: StagingConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub tables: TableList,
}

impl HistoryLoadConfig {
    /// Pipeline tag attached to every log record of the run.
    pub fn pipeline_name(&self) -> String {
        format!("{}-HistoryLoad", self.source_name)
    }

    /// Resolve every table entry against the connection defaults, in
    /// configuration order.
    pub fn table_configs(&self) -> Vec<TableConfig> {
        self.tables
            .iter()
            .map(|entry| TableConfig {
                name: entry.name.clone(),
                active: entry.settings.active_flag,
                destination_schema_mode: entry.settings.red_schema,
                source: TableRef::new(
                    entry
                        .settings
                        .source_schema
                        .clone()
                        .unwrap_or_else(|| self.source.schema.clone()),
                    entry.name.clone(),
                ),
                destination: TableRef::new(
                    entry
                        .settings
                        .destination_schema
                        .clone()
                        .unwrap_or_else(|| self.destination.schema.clone()),
                    entry
                        .settings
                        .destination_table
                        .clone()
                        .unwrap_or_else(|| entry.name.clone()),
                ),
            })
            .collect()
    }
}

/// Source database section. `config` is handed to the source connector as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    /// Default schema for tables that do not set `source_schema`.
    pub schema: String,
    pub config: serde_json::Value,
}

/// Warehouse section. `config` is handed to the destination connector as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationSection {
    /// Default schema for tables that do not set `destination_schema`.
    pub schema: String,
    /// Role the warehouse assumes to read staged files during COPY.
    pub iam_role: String,
    pub config: serde_json::Value,
}

/// Object storage layout for staged Parquet files.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    #[serde(flatten)]
    pub store: StoreConfig,
    /// Key prefix under which every table's partitions are written.
    #[serde(default)]
    pub landing_prefix: String,
}

/// Backend that receives staged objects, selected by `store:`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Amazon S3 (or an S3-compatible endpoint).
    S3 {
        bucket: String,
        /// Falls back to the AWS default region chain when unset.
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint_url: Option<String>,
    },
    /// Local directory, e.g. a mounted bucket.
    Local {
        root: PathBuf,
        /// URI the warehouse addresses `root` with, e.g. `s3://my-bucket`.
        uri_base: String,
    },
}

/// Knobs for extraction and coercion.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_service_identity")]
    pub service_identity: String,
    #[serde(default = "default_date_exemptions")]
    pub date_exemptions: Vec<String>,
    #[serde(default = "default_failure_log")]
    pub failure_log: PathBuf,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_service_identity() -> String {
    DEFAULT_SERVICE_IDENTITY.to_string()
}

fn default_date_exemptions() -> Vec<String> {
    DEFAULT_DATE_EXEMPTIONS.iter().map(ToString::to_string).collect()
}

fn default_failure_log() -> PathBuf {
    PathBuf::from("history_load_failures.log")
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            service_identity: default_service_identity(),
            date_exemptions: default_date_exemptions(),
            failure_log: default_failure_log(),
        }
    }
}

/// Per-table settings as written in YAML.
///
/// A table only runs when `active_flag` is set explicitly; an entry with no
/// settings at all stays inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSettings {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub active_flag: bool,
    /// Infer the schema from the warehouse catalog instead of the source.
    #[serde(
        default = "default_red_schema",
        alias = "destination_schema_mode",
        deserialize_with = "deserialize_flag"
    )]
    pub red_schema: bool,
    #[serde(default)]
    pub source_schema: Option<String>,
    #[serde(default)]
    pub destination_schema: Option<String>,
    #[serde(default)]
    pub destination_table: Option<String>,
}

fn default_red_schema() -> bool {
    true
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            active_flag: false,
            red_schema: default_red_schema(),
            source_schema: None,
            destination_schema: None,
            destination_table: None,
        }
    }
}

/// Accepts YAML booleans and the `T`/`F`/`Y`/`N`/`true`/`false` strings.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "1" => Ok(true),
            "f" | "false" | "n" | "no" | "0" => Ok(false),
            other => Err(de::Error::custom(format!("invalid flag value '{other}'"))),
        },
    }
}

/// One named table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub name: String,
    pub settings: TableSettings,
}

/// Table mapping that keeps YAML declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableList(Vec<TableEntry>);

impl TableList {
    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<TableEntry>> for TableList {
    fn from(entries: Vec<TableEntry>) -> Self {
        Self(entries)
    }
}

impl<'de> Deserialize<'de> for TableList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableListVisitor;

        impl<'de> Visitor<'de> for TableListVisitor {
            type Value = TableList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of table name to table settings")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, settings)) =
                    map.next_entry::<String, Option<TableSettings>>()?
                {
                    entries.push(TableEntry {
                        name,
                        settings: settings.unwrap_or_default(),
                    });
                }
                Ok(TableList(entries))
            }
        }

        deserializer.deserialize_map(TableListVisitor)
    }
}

/// Resolved configuration of one table for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub name: String,
    pub active: bool,
    pub destination_schema_mode: bool,
    pub source: TableRef,
    pub destination: TableRef,
}
