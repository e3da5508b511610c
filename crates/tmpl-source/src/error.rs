//! Error types for tmpl-source

use std::path::PathBuf;

/// Result type for tmpl-source operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching remote values files
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Fetch of {location} was cancelled")]
    Cancelled { location: String },

    #[error("Failed to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to check out '{reference}' in {url}: {source}")]
    Checkout {
        url: String,
        reference: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to read {path} from {url}: {source}")]
    RepoFile {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git location {url} does not name a file inside the repository")]
    EmptySubpath { url: String },

    #[error("Path '{subpath}' escapes the repository {url}")]
    SubpathEscapes { url: String, subpath: String },

    #[error("Object storage request for s3://{bucket}/{key} failed: {message}")]
    ObjectStore {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Invalid registry reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    #[error("Registry request for {reference} failed: {message}")]
    Registry { reference: String, message: String },

    #[error("Blob {expected} from {reference} has digest {actual}")]
    Digest {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("The {backend} fetcher cannot fetch {location}")]
    Unsupported {
        backend: &'static str,
        location: String,
    },

    #[error("Local path {path} is read from the filesystem, not fetched")]
    NotRemote { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Whether this error was caused by cancellation rather than a backend failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub(crate) fn registry(reference: &str, message: impl std::fmt::Display) -> Self {
        Self::Registry {
            reference: reference.to_string(),
            message: message.to_string(),
        }
    }
}
