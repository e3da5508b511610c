//! Error types for tmpl-values

use std::path::PathBuf;

use crate::tree::ParseError;

/// Result type for tmpl-values operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading values
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Values file path is empty")]
    EmptyPath,

    #[error("Failed to read values file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch values file {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: tmpl_source::Error,
    },

    #[error("Values file {origin} is not valid UTF-8 after expansion: {source}")]
    Encoding {
        origin: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Failed to decode YAML in {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: ParseError,
    },

    #[error("Values file {origin} must decode to a mapping, found {found}")]
    NotAMapping { origin: String, found: &'static str },

    #[error("Secret key '{key}' in {origin} must hold a string reference, found {found}")]
    SecretNotString {
        key: String,
        origin: String,
        found: &'static str,
    },

    #[error("Key '{key}' appears both with and without the secret suffix in {origin}")]
    DuplicateKey { key: String, origin: String },

    #[error("Failed to decrypt secret '{reference}' in {origin}: {source}")]
    Decrypt {
        reference: String,
        origin: String,
        #[source]
        source: tmpl_secrets::Error,
    },

    #[error("Decrypted secret '{reference}' in {origin} is not valid UTF-8: {source}")]
    SecretEncoding {
        reference: String,
        origin: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to read env file {path}: {source}")]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid env entry {content:?} in {path} on line {line}")]
    EnvFileSyntax {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Secret decryption is unavailable: {0}")]
    Setup(#[source] tmpl_secrets::Error),

    #[error("Loading {origin} was cancelled")]
    Cancelled { origin: String },
}

impl Error {
    /// Whether the load stopped because its cancellation token fired
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Fetch { source, .. } => source.is_cancelled(),
            Self::Decrypt { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
