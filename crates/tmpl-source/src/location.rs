//! Classification of values file references
//!
//! A reference string is classified purely by its prefix:
//!
//! - `git+<url>[/<subpath>][#<ref>]` - a file inside a git repository
//! - `s3://<bucket>/<key>` - an object in S3-compatible storage
//! - `oci://<reference>` - an artifact in an OCI registry
//! - anything else - a local filesystem path
//!
//! Classification never touches the filesystem or the network and never fails.

use std::fmt;
use std::path::PathBuf;

const GIT_PREFIX: &str = "git+";
const S3_PREFIX: &str = "s3://";
const OCI_PREFIX: &str = "oci://";

/// Where a values file comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// A file on the local filesystem
    Local { path: PathBuf },

    /// A file inside a git repository
    Git {
        /// URL handed to the git transport, without subpath or fragment
        repository: String,
        /// Path of the file relative to the repository root
        subpath: String,
        /// Branch name or commit hash to check out
        reference: Option<String>,
    },

    /// An object in S3-compatible storage
    ObjectStore { bucket: String, key: String },

    /// An artifact in an OCI registry, passed through verbatim
    Registry { reference: String },
}

impl Location {
    /// Classify a raw reference string.
    pub fn classify(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix(GIT_PREFIX) {
            return parse_git(rest);
        }
        if let Some(rest) = raw.strip_prefix(S3_PREFIX) {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            return Self::ObjectStore {
                bucket: bucket.to_string(),
                key: key.trim_start_matches('/').to_string(),
            };
        }
        if let Some(rest) = raw.strip_prefix(OCI_PREFIX) {
            return Self::Registry {
                reference: rest.to_string(),
            };
        }
        Self::Local {
            path: PathBuf::from(raw),
        }
    }

    /// Short scheme name, used in log fields
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Git { .. } => "git",
            Self::ObjectStore { .. } => "s3",
            Self::Registry { .. } => "oci",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::Git {
                repository,
                subpath,
                reference,
            } => {
                write!(f, "{GIT_PREFIX}{repository}//{subpath}")?;
                if let Some(reference) = reference {
                    write!(f, "#{reference}")?;
                }
                Ok(())
            }
            Self::ObjectStore { bucket, key } => write!(f, "{S3_PREFIX}{bucket}/{key}"),
            Self::Registry { reference } => write!(f, "{OCI_PREFIX}{reference}"),
        }
    }
}

fn parse_git(rest: &str) -> Location {
    let (url, reference) = match rest.split_once('#') {
        Some((url, fragment)) => (url, Some(fragment).filter(|f| !f.is_empty())),
        None => (rest, None),
    };
    let (repository, subpath) = split_repository(url);
    Location::Git {
        repository,
        subpath,
        reference: reference.map(str::to_string),
    }
}

/// Split a git URL into the repository URL and the in-repository subpath.
///
/// The repository ends at the first path segment ending in `.git`. Without
/// such a segment, `//` separates repository and subpath. Failing both, the
/// whole path is the subpath.
fn split_repository(url: &str) -> (String, String) {
    let path_start = match url.find("://") {
        Some(idx) => {
            let authority = idx + 3;
            url[authority..].find('/').map(|p| authority + p)
        }
        None => url.find('/'),
    };
    let Some(path_start) = path_start else {
        return (url.to_string(), String::new());
    };
    let (base, path) = url.split_at(path_start);

    let mut end = 0;
    for segment in path.split('/') {
        end += segment.len();
        if segment.ends_with(".git") {
            let (repo_path, subpath) = path.split_at(end);
            return (
                format!("{base}{repo_path}"),
                subpath.trim_start_matches('/').to_string(),
            );
        }
        end += 1;
    }

    if let Some(idx) = path.find("//") {
        return (
            format!("{base}{}", &path[..idx]),
            path[idx + 2..].trim_start_matches('/').to_string(),
        );
    }

    (base.to_string(), path.trim_start_matches('/').to_string())
}
