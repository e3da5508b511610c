//! The decryption capability consumed by the values pipeline

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Turns encrypted content into plaintext bytes
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Decrypt an in-memory ciphertext blob.
    async fn decrypt(&self, cancel: &CancellationToken, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt the file at `path`.
    async fn decrypt_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Vec<u8>>;
}
