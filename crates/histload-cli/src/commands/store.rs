//! Staging store selected by the `staging.store` setting.

use anyhow::{Context, Result};
use bytes::Bytes;
use histload_engine::config::{StagingConfig, StoreConfig};
use histload_engine::LocalObjectStore;
use histload_sdk::connector::ObjectStore;
use histload_sdk::error::ConnectorError;
use stage_s3::S3ObjectStore;

pub enum StagingStore {
    S3(S3ObjectStore),
    Local(LocalObjectStore),
}

impl StagingStore {
    pub async fn from_config(staging: &StagingConfig) -> Result<Self> {
        match &staging.store {
            StoreConfig::S3 {
                bucket,
                region,
                endpoint_url,
            } => {
                let config = stage_s3::Config {
                    bucket: bucket.clone(),
                    region: region.clone(),
                    endpoint_url: endpoint_url.clone(),
                };
                let store = S3ObjectStore::connect(config)
                    .await
                    .context("Invalid staging section")?;
                Ok(Self::S3(store))
            }
            StoreConfig::Local { root, uri_base } => {
                Ok(Self::Local(LocalObjectStore::new(root, uri_base)))
            }
        }
    }
}

impl ObjectStore for StagingStore {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), ConnectorError> {
        match self {
            Self::S3(store) => store.put(key, body).await,
            Self::Local(store) => store.put(key, body).await,
        }
    }

    fn uri_for(&self, prefix: &str) -> String {
        match self {
            Self::S3(store) => store.uri_for(prefix),
            Self::Local(store) => store.uri_for(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_store_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let staging: StagingConfig = serde_yaml::from_str(&format!(
            "store: local\nroot: {}\nuri_base: s3://hr-landing/\n",
            dir.path().display()
        ))
        .unwrap();

        let store = StagingStore::from_config(&staging).await.unwrap();
        assert!(matches!(store, StagingStore::Local(_)));
        store
            .put("raw/Employee/Employee_1.parquet", Bytes::from_static(b"PAR1"))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("raw/Employee/Employee_1.parquet")).unwrap(),
            b"PAR1"
        );
        assert_eq!(store.uri_for("raw/Employee/"), "s3://hr-landing/raw/Employee/");
    }

    #[tokio::test]
    async fn s3_store_addresses_bucket() {
        let staging: StagingConfig = serde_yaml::from_str(
            "store: s3\nbucket: hr-landing\nregion: us-west-2\nlanding_prefix: raw/\n",
        )
        .unwrap();

        let store = StagingStore::from_config(&staging).await.unwrap();
        assert!(matches!(store, StagingStore::S3(_)));
        assert_eq!(store.uri_for("raw/Employee/"), "s3://hr-landing/raw/Employee/");
    }
}
