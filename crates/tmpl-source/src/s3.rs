//! S3 backend: one `GetObject` call per fetch
//!
//! Credentials, region and profile come from the ambient AWS configuration
//! chain (environment variables, shared config files, instance metadata).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use tokio_util::sync::CancellationToken;

use crate::fetcher::Fetcher;
use crate::{Error, Location, Result};

/// Overrides applied on top of the ambient AWS configuration
#[derive(Debug, Clone, Default)]
pub struct S3FetcherConfig {
    /// Custom endpoint, e.g. a MinIO server
    pub endpoint_url: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
}

/// Fetches objects from S3-compatible storage
#[derive(Debug, Clone, Default)]
pub struct S3Fetcher {
    config: S3FetcherConfig,
}

impl S3Fetcher {
    pub fn new(config: S3FetcherConfig) -> Self {
        Self { config }
    }

    async fn client(&self) -> aws_sdk_s3::Client {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(self.config.force_path_style);
        if let Some(endpoint) = &self.config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let failure = |message: String| Error::ObjectStore {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let client = self.client().await;
        let response = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| failure(DisplayErrorContext(&e).to_string()))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| failure(e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }
}

#[async_trait]
impl Fetcher for S3Fetcher {
    async fn fetch(&self, cancel: &CancellationToken, location: &Location) -> Result<Vec<u8>> {
        let Location::ObjectStore { bucket, key } = location else {
            return Err(Error::Unsupported {
                backend: "s3",
                location: location.to_string(),
            });
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled {
                location: location.to_string(),
            }),
            result = self.get_object(bucket, key) => result,
        }
    }
}
