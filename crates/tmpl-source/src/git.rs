//! Git backend: clone into a private temporary directory and read one file
//!
//! git2 is blocking, so each fetch runs on the blocking thread pool. The
//! transfer-progress callback polls the cancellation token so a cancelled
//! fetch stops downloading instead of running to completion in the background.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Commit, Cred, FetchOptions, RemoteCallbacks, Repository};
use tokio_util::sync::CancellationToken;

use crate::fetcher::Fetcher;
use crate::{Error, Location, Result};

/// Username used for the authenticated clone retry
pub const GIT_USERNAME_ENV: &str = "TMPL_GIT_USERNAME";
/// Password or token used for the authenticated clone retry
pub const GIT_PASSWORD_ENV: &str = "TMPL_GIT_PASSWORD";

const WORKDIR_PREFIX: &str = "tmpl-git-";

/// Fetches a single file out of a git repository
#[derive(Debug, Clone, Default)]
pub struct GitFetcher;

impl GitFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn fetch(&self, cancel: &CancellationToken, location: &Location) -> Result<Vec<u8>> {
        let Location::Git {
            repository,
            subpath,
            reference,
        } = location
        else {
            return Err(Error::Unsupported {
                backend: "git",
                location: location.to_string(),
            });
        };

        if subpath.is_empty() {
            return Err(Error::EmptySubpath {
                url: repository.clone(),
            });
        }
        if !stays_inside_checkout(subpath) {
            return Err(Error::SubpathEscapes {
                url: repository.clone(),
                subpath: subpath.clone(),
            });
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                location: location.to_string(),
            });
        }

        let request = CloneRequest {
            url: repository.clone(),
            subpath: subpath.clone(),
            reference: reference.clone(),
            credentials: credentials_from_env(),
        };
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || request.run(&token));

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled {
                location: location.to_string(),
            }),
            joined = task => joined?,
        };
        result.map_err(|err| match err {
            Error::Cancelled { .. } => Error::Cancelled {
                location: location.to_string(),
            },
            other => other,
        })
    }
}

/// Only plain relative segments are allowed: no root, prefix or `..`.
fn stays_inside_checkout(subpath: &str) -> bool {
    Path::new(subpath)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read basic-auth credentials for the clone retry.
///
/// Both variables must be set. When only one is present the retry stays
/// disabled and a warning is logged.
fn credentials_from_env() -> Option<Credentials> {
    let username = std::env::var(GIT_USERNAME_ENV)
        .ok()
        .filter(|v| !v.is_empty());
    let password = std::env::var(GIT_PASSWORD_ENV)
        .ok()
        .filter(|v| !v.is_empty());

    match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        (None, None) => None,
        (username, _) => {
            let missing = if username.is_some() {
                GIT_PASSWORD_ENV
            } else {
                GIT_USERNAME_ENV
            };
            tracing::warn!(
                missing,
                "Git credentials are only partially configured; authenticated retry is disabled"
            );
            None
        }
    }
}

#[derive(Debug)]
struct CloneRequest {
    url: String,
    subpath: String,
    reference: Option<String>,
    credentials: Option<Credentials>,
}

impl CloneRequest {
    fn run(&self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        // Removed when dropped, after the file has been read.
        let workdir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir()?;
        let checkout = workdir.path().join("repo");

        let repo = match clone_repository(&self.url, &checkout, None, cancel) {
            Ok(repo) => repo,
            Err(anonymous) => {
                let Some(credentials) = &self.credentials else {
                    return Err(self.clone_error(anonymous, cancel));
                };
                tracing::debug!(
                    url = %self.url,
                    error = %anonymous,
                    "Anonymous clone failed, retrying with credentials"
                );
                if checkout.exists() {
                    std::fs::remove_dir_all(&checkout)?;
                }
                clone_repository(&self.url, &checkout, Some(credentials), cancel)
                    .map_err(|source| self.clone_error(source, cancel))?
            }
        };

        if let Some(reference) = &self.reference {
            checkout_reference(&repo, reference).map_err(|source| Error::Checkout {
                url: self.url.clone(),
                reference: reference.clone(),
                source,
            })?;
        }

        let target = checkout.join(&self.subpath);
        tracing::debug!(url = %self.url, path = %target.display(), "Reading file from clone");
        std::fs::read(&target).map_err(|source| Error::RepoFile {
            url: self.url.clone(),
            path: PathBuf::from(&self.subpath),
            source,
        })
    }

    fn clone_error(&self, source: git2::Error, cancel: &CancellationToken) -> Error {
        if cancel.is_cancelled() {
            Error::Cancelled {
                location: self.url.clone(),
            }
        } else {
            Error::Clone {
                url: self.url.clone(),
                source,
            }
        }
    }
}

fn clone_repository(
    url: &str,
    into: &Path,
    credentials: Option<&Credentials>,
    cancel: &CancellationToken,
) -> std::result::Result<Repository, git2::Error> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|_| !cancel.is_cancelled());

    if let Some(credentials) = credentials {
        // libgit2 keeps asking while the server rejects the credentials
        let mut attempts = 0;
        callbacks.credentials(move |_url, _username, _allowed| {
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::from_str("credentials rejected by remote"));
            }
            Cred::userpass_plaintext(&credentials.username, &credentials.password)
        });
    }

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    RepoBuilder::new()
        .fetch_options(fetch_options)
        .clone(url, into)
}

/// Check out `reference` as a branch, falling back to a revision.
///
/// HEAD is left detached at the resolved commit.
fn checkout_reference(repo: &Repository, reference: &str) -> std::result::Result<(), git2::Error> {
    let commit = match find_branch_commit(repo, reference) {
        Some(commit) => commit,
        None => {
            tracing::debug!(reference, "No branch found, resolving as revision");
            repo.revparse_single(reference)?.peel_to_commit()?
        }
    };

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(commit.id())?;
    Ok(())
}

fn find_branch_commit<'r>(repo: &'r Repository, name: &str) -> Option<Commit<'r>> {
    [
        format!("refs/remotes/origin/{name}"),
        format!("refs/heads/{name}"),
    ]
    .iter()
    .find_map(|refname| repo.find_reference(refname).ok()?.peel_to_commit().ok())
}
