//! `${NAME}` placeholder expansion
//!
//! The variable table is a snapshot of the process environment overlaid with
//! zero or more env files. Later files win over earlier ones and over the
//! process environment.
//!
//! Env file format, one entry per line:
//!
//! ```text
//! # comment
//! DB_HOST = db.internal   # trailing comment
//! EMPTY=
//! ```
//!
//! Everything from `#` to the end of a line is ignored. The remainder is split
//! at the first `=`, and both sides are trimmed. A non-blank line without `=`
//! is an error.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};

use crate::{ConfigTree, Error, Result};

/// `${NAME}` where NAME is uppercase letters, digits and underscores
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z0-9_]+)\}").expect("Invalid placeholder regex")
});

/// Substitutes `${NAME}` placeholders from a fixed variable table
#[derive(Debug, Clone, Default)]
pub struct EnvResolver {
    vars: HashMap<String, String>,
}

impl EnvResolver {
    /// Snapshot the process environment and overlay `env_files` in order.
    pub fn new<P: AsRef<Path>>(env_files: &[P]) -> Result<Self> {
        Self::from_process_env().with_env_files(env_files)
    }

    /// Snapshot the process environment. Variables that are not valid UTF-8
    /// are skipped.
    pub fn from_process_env() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Build a resolver from an explicit table, ignoring the process environment.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Overlay env files on top of the current table.
    pub fn with_env_files<P: AsRef<Path>>(mut self, env_files: &[P]) -> Result<Self> {
        for path in env_files {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|source| Error::EnvFileRead {
                path: path.to_path_buf(),
                source,
            })?;
            let entries = parse_env_file(path, &content)?;
            tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded env file");
            self.vars.extend(entries);
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Replace every `${NAME}` whose NAME is known. Unknown placeholders and
    /// anything not matching the placeholder grammar are left untouched.
    pub fn expand<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| {
            let name = std::str::from_utf8(&caps[1]).unwrap_or_default();
            match self.vars.get(name) {
                Some(value) => value.as_bytes().to_vec(),
                None => caps[0].to_vec(),
            }
        })
    }

    pub fn expand_str(&self, input: &str) -> String {
        String::from_utf8_lossy(&self.expand(input.as_bytes())).into_owned()
    }

    /// Expand placeholders in every string scalar of `tree`. Keys are not
    /// expanded.
    pub fn expand_tree(&self, tree: &mut ConfigTree) {
        match tree {
            ConfigTree::String(s) => {
                if PLACEHOLDER.is_match(s.as_bytes()) {
                    *s = self.expand_str(s);
                }
            }
            ConfigTree::Sequence(items) => items.iter_mut().for_each(|item| self.expand_tree(item)),
            ConfigTree::Mapping(map) => map.values_mut().for_each(|value| self.expand_tree(value)),
            ConfigTree::Null | ConfigTree::Bool(_) | ConfigTree::Number(_) => {}
        }
    }
}

fn parse_env_file(path: &Path, content: &str) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::EnvFileSyntax {
                path: PathBuf::from(path),
                line: index + 1,
                content: line.to_string(),
            });
        };
        entries.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(entries)
}
