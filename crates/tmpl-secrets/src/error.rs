//! Error types for tmpl-secrets

use std::path::PathBuf;

/// Result type for tmpl-secrets operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decrypting secrets
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The decryption tool is not available in this environment
    #[error("{binary} binary not found: {message}")]
    Setup { binary: String, message: String },

    #[error("Missing path for secret decryption")]
    EmptyPath,

    /// The tool ran but reported a failure
    #[error("Decryption of {target} failed (exit code {code}): {diagnostics}")]
    Decrypt {
        target: String,
        code: i32,
        diagnostics: String,
    },

    #[error("Decryption of {target} was cancelled")]
    Cancelled { target: String },

    #[error("Failed to run {binary}: {source}")]
    Io {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
