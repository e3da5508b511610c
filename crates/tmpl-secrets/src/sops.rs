//! `sops` CLI adapter
//!
//! Each call spawns `sops -d <target>` and captures its output. Children are
//! spawned with `kill_on_drop`, so dropping the future on cancellation also
//! terminates the process.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::decryptor::Decryptor;
use crate::{Error, Result};

/// Default binary name looked up on `PATH`
pub const SOPS_BINARY: &str = "sops";

const STDIN_TARGET: &str = "/dev/stdin";

/// Decryptor backed by the `sops` command-line tool
#[derive(Debug, Clone)]
pub struct SopsDecryptor {
    binary: PathBuf,
}

impl SopsDecryptor {
    /// Locate `sops` on `PATH`.
    pub fn new() -> Result<Self> {
        Self::with_binary(SOPS_BINARY)
    }

    /// Use a specific binary, either a bare name searched on `PATH` or a path.
    pub fn with_binary(binary: impl AsRef<Path>) -> Result<Self> {
        let binary = binary.as_ref();
        let resolved = resolve_binary(binary).ok_or_else(|| Error::Setup {
            binary: binary.display().to_string(),
            message: "not found on PATH or not executable".to_string(),
        })?;
        tracing::debug!(binary = %resolved.display(), "Using sops for secret decryption");
        Ok(Self { binary: resolved })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        target: &OsStr,
        stdin: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let label = target.to_string_lossy().to_string();
        let io_error = |source| Error::Io {
            binary: self.binary.clone(),
            source,
        };

        let mut command = Command::new(&self.binary);
        command
            .arg("-d")
            .arg(target)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(io_error)?;
        let pipe = child.stdin.take();

        let execution = async {
            let write = async {
                if let (Some(mut pipe), Some(input)) = (pipe, stdin) {
                    pipe.write_all(input).await?;
                }
                Ok::<(), std::io::Error>(())
            };
            let (written, output) = tokio::join!(write, child.wait_with_output());
            let output = output.map_err(io_error)?;

            if !output.status.success() {
                return Err(Error::Decrypt {
                    target: label.clone(),
                    code: output.status.code().unwrap_or(-1),
                    diagnostics: diagnostics(&output.stderr, &output.stdout),
                });
            }
            written.map_err(io_error)?;
            Ok(output.stdout)
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled { target: label.clone() }),
            result = execution => result,
        }
    }
}

#[async_trait]
impl Decryptor for SopsDecryptor {
    async fn decrypt(&self, cancel: &CancellationToken, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.run(cancel, OsStr::new(STDIN_TARGET), Some(ciphertext))
            .await
    }

    async fn decrypt_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Vec<u8>> {
        if path.as_os_str().is_empty() {
            return Err(Error::EmptyPath);
        }
        tracing::debug!(path = %path.display(), "Decrypting secret file");
        self.run(cancel, path.as_os_str(), None).await
    }
}

fn diagnostics(stderr: &[u8], stdout: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stdout);
    }
    text
}

fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    if binary.as_os_str().is_empty() {
        return None;
    }
    if binary.components().count() > 1 {
        return is_executable(binary).then(|| binary.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| executable_in(&dir, binary))
}

#[cfg(unix)]
fn executable_in(dir: &Path, name: &Path) -> Option<PathBuf> {
    let candidate = dir.join(name);
    is_executable(&candidate).then_some(candidate)
}

#[cfg(not(unix))]
fn executable_in(dir: &Path, name: &Path) -> Option<PathBuf> {
    let candidate = dir.join(name).with_extension("exe");
    is_executable(&candidate).then_some(candidate)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
