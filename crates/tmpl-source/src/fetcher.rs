//! Fetcher trait and the scheme-dispatching remote fetcher

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::git::GitFetcher;
use crate::oci::{OciFetcher, OciFetcherConfig};
use crate::s3::{S3Fetcher, S3FetcherConfig};
use crate::{Error, Location, Result};

/// Retrieves the raw bytes behind a non-local [`Location`]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, cancel: &CancellationToken, location: &Location) -> Result<Vec<u8>>;
}

/// Fetcher that routes each location to the backend for its scheme
pub struct RemoteFetcher {
    git: GitFetcher,
    s3: S3Fetcher,
    oci: OciFetcher,
}

impl RemoteFetcher {
    pub fn new(git: GitFetcher, s3: S3Fetcher, oci: OciFetcher) -> Self {
        Self { git, s3, oci }
    }

    /// Build every backend from ambient environment configuration
    pub fn from_env() -> Self {
        Self::new(
            GitFetcher::new(),
            S3Fetcher::new(S3FetcherConfig::default()),
            OciFetcher::new(OciFetcherConfig::from_env()),
        )
    }
}

impl Default for RemoteFetcher {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl Fetcher for RemoteFetcher {
    async fn fetch(&self, cancel: &CancellationToken, location: &Location) -> Result<Vec<u8>> {
        tracing::debug!(scheme = location.scheme(), %location, "Fetching remote values file");
        match location {
            Location::Local { path } => Err(Error::NotRemote { path: path.clone() }),
            Location::Git { .. } => self.git.fetch(cancel, location).await,
            Location::ObjectStore { .. } => self.s3.fetch(cancel, location).await,
            Location::Registry { .. } => self.oci.fetch(cancel, location).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn local_locations_are_rejected() {
        let fetcher = RemoteFetcher::default();
        let location = Location::classify("values.yaml");

        let err = fetcher
            .fetch(&CancellationToken::new(), &location)
            .await
            .unwrap_err();

        match err {
            Error::NotRemote { path } => assert_eq!(path, PathBuf::from("values.yaml")),
            other => panic!("Expected NotRemote, got: {other}"),
        }
    }
}
