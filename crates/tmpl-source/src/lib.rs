//! Location parsing and remote fetching for tmpl values files
//!
//! A values file reference is classified into a [`Location`] by its prefix,
//! and non-local locations are retrieved as raw bytes through a [`Fetcher`].

pub mod error;
pub mod fetcher;
pub mod git;
pub mod location;
pub mod oci;
pub mod s3;

pub use error::{Error, Result};
pub use fetcher::{Fetcher, RemoteFetcher};
pub use git::{GIT_PASSWORD_ENV, GIT_USERNAME_ENV, GitFetcher};
pub use location::Location;
pub use oci::{OciFetcher, OciFetcherConfig};
pub use s3::{S3Fetcher, S3FetcherConfig};
pub use tokio_util::sync::CancellationToken;
