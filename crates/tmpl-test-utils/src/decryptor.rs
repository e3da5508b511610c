//! In-memory [`Decryptor`] for pipeline tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tmpl_secrets::{Decryptor, Error, Result};
use tmpl_source::CancellationToken;

/// Decryptor that serves registered plaintexts and records every request.
///
/// ```rust,no_run
/// use tmpl_test_utils::StaticDecryptor;
///
/// let decryptor = StaticDecryptor::new()
///     .with_file("/charts/app/secrets/db.yaml", "password: hunter2");
/// ```
#[derive(Debug, Default)]
pub struct StaticDecryptor {
    files: HashMap<PathBuf, Vec<u8>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl StaticDecryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `plaintext` for `decrypt_file(path)`.
    pub fn with_file(mut self, path: impl Into<PathBuf>, plaintext: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.into(), plaintext.as_ref().to_vec());
        self
    }

    /// Paths passed to `decrypt_file`, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Decryptor for StaticDecryptor {
    /// Values trees only reference files, so in-memory ciphertext is refused.
    async fn decrypt(&self, cancel: &CancellationToken, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                target: "<stdin>".to_string(),
            });
        }
        Err(Error::Decrypt {
            target: "<stdin>".to_string(),
            code: 1,
            diagnostics: "in-memory ciphertext is not registered".to_string(),
        })
    }

    async fn decrypt_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                target: path.display().to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.to_path_buf());
        self.files.get(path).cloned().ok_or_else(|| Error::Decrypt {
            target: path.display().to_string(),
            code: 1,
            diagnostics: format!("{}: no such file or directory", path.display()),
        })
    }
}
