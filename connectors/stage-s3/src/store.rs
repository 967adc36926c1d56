//! [`ObjectStore`] implementation backed by an S3 bucket.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use histload_sdk::prelude::*;

use crate::config::Config;

/// Puts staged chunks into one bucket; keys are used verbatim.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the AWS default credential chain.
    ///
    /// # Errors
    ///
    /// Returns a config error if `config` fails validation.
    pub async fn connect(config: Config) -> Result<Self, ConnectorError> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = ?shared.region(),
            endpoint = ?config.endpoint_url,
            "S3 staging client ready"
        );
        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket.trim(),
        ))
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), ConnectorError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| put_error(&self.bucket, key, &e))?;
        tracing::debug!(bucket = %self.bucket, key, bytes = size, "Put staged object");
        Ok(())
    }

    fn uri_for(&self, prefix: &str) -> String {
        format!("s3://{}/{}", self.bucket, prefix.trim_start_matches('/'))
    }
}

fn put_error<R: std::fmt::Debug>(
    bucket: &str,
    key: &str,
    err: &SdkError<PutObjectError, R>,
) -> ConnectorError {
    let message = format!("put s3://{bucket}/{key}: {}", DisplayErrorContext(err));
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ConnectorError::transient_network("PUT_FAILED", message)
        }
        _ => classify_service_error(err.as_service_error().and_then(|e| e.code()), message),
    }
}

/// Map an S3 error code to a connector error.
fn classify_service_error(code: Option<&str>, message: String) -> ConnectorError {
    match code {
        Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken") => {
            ConnectorError::auth("ACCESS_DENIED", message)
        }
        Some("NoSuchBucket") => ConnectorError::config("NO_SUCH_BUCKET", message),
        _ => ConnectorError::storage("PUT_FAILED", message),
    }
}
