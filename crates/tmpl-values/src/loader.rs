//! Values loader: the full resolution pipeline for one chart

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tmpl_secrets::{Decryptor, SopsDecryptor};
use tmpl_source::{CancellationToken, Fetcher, Location, RemoteFetcher};

use crate::decrypt::TreeDecryptor;
use crate::env::EnvResolver;
use crate::merge::merge;
use crate::{ConfigTree, Error, Result};

/// Base values file inside a chart directory
pub const VALUES_FILE: &str = "values.yaml";

/// Options for [`Loader::new`]
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Env files overlaid on the process environment, in order
    pub env_files: Vec<PathBuf>,
}

/// Loads and merges values files for a chart.
///
/// A loader holds no per-load state, so one instance can serve concurrent
/// loads.
pub struct Loader {
    env: EnvResolver,
    decryptor: Arc<dyn Decryptor>,
    fetcher: Arc<dyn Fetcher>,
}

impl Loader {
    /// Build a loader with the production collaborators.
    ///
    /// Fails immediately when an env file is unreadable or malformed, or when
    /// `sops` cannot be found.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let env = EnvResolver::new(&config.env_files)?;
        let decryptor = SopsDecryptor::new().map_err(Error::Setup)?;
        Ok(Self::with_components(
            env,
            Arc::new(decryptor),
            Arc::new(RemoteFetcher::from_env()),
        ))
    }

    pub fn with_components(
        env: EnvResolver,
        decryptor: Arc<dyn Decryptor>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            env,
            decryptor,
            fetcher,
        }
    }

    /// Resolve the final values for the chart at `chart`.
    ///
    /// `<chart>/values.yaml` is the base layer and may be absent. Each entry
    /// of `extra_files` is then merged on top, in order. Every extra file must
    /// exist; the first failure aborts the load.
    pub async fn load<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        chart: &Path,
        extra_files: &[S],
    ) -> Result<ConfigTree> {
        let chart = if chart.as_os_str().is_empty() {
            Path::new(".")
        } else {
            chart
        };

        let base = chart.join(VALUES_FILE);
        let mut values = match self.load_local(cancel, &base).await {
            Ok(tree) => tree,
            Err(Error::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %base.display(), "Chart has no base values file");
                ConfigTree::empty()
            }
            Err(err) => return Err(err),
        };

        for raw in extra_files {
            let raw = raw.as_ref();
            let layer = self.load_file(cancel, raw).await?;
            merge(&mut values, layer);
            tracing::info!(file = raw, "Merged values file");
        }

        Ok(values)
    }

    /// Load and process a single values reference without merging.
    pub async fn load_file(&self, cancel: &CancellationToken, raw: &str) -> Result<ConfigTree> {
        if raw.is_empty() {
            return Err(Error::EmptyPath);
        }

        match Location::classify(raw) {
            Location::Local { path } => self.load_local(cancel, &path).await,
            location => {
                tracing::debug!(scheme = location.scheme(), location = %location, "Fetching remote values");
                let bytes = self
                    .fetcher
                    .fetch(cancel, &location)
                    .await
                    .map_err(|source| Error::Fetch {
                        location: raw.to_string(),
                        source,
                    })?;
                // Relative secret references in remote files have no local anchor
                self.process(cancel, &bytes, None, raw).await
            }
        }
    }

    async fn load_local(&self, cancel: &CancellationToken, path: &Path) -> Result<ConfigTree> {
        let origin = path.display().to_string();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled { origin });
        }
        let bytes = tokio::fs::read(path).await.map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.process(cancel, &bytes, path.parent(), &origin).await
    }

    async fn process(
        &self,
        cancel: &CancellationToken,
        bytes: &[u8],
        base_dir: Option<&Path>,
        origin: &str,
    ) -> Result<ConfigTree> {
        let expanded = self.env.expand(bytes);
        let text = std::str::from_utf8(&expanded).map_err(|source| Error::Encoding {
            origin: origin.to_string(),
            source,
        })?;
        let tree = ConfigTree::from_yaml_str(text).map_err(|source| Error::Decode {
            origin: origin.to_string(),
            source,
        })?;

        let tree = match tree {
            ConfigTree::Null => ConfigTree::empty(),
            tree if tree.is_mapping() => tree,
            other => {
                return Err(Error::NotAMapping {
                    origin: origin.to_string(),
                    found: other.kind(),
                });
            }
        };

        TreeDecryptor::new(self.decryptor.as_ref(), cancel, base_dir, origin)
            .resolve(tree)
            .await
    }
}
