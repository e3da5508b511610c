//! Secret references inside values trees
//!
//! A mapping key ending in `.enc` marks its value as a path to an encrypted
//! file. The decrypted plaintext replaces the value and the suffix is dropped
//! from the key:
//!
//! ```yaml
//! # before
//! db:
//!   password.enc: secrets/db-password.enc
//! # after
//! db:
//!   password: hunter2
//! ```
//!
//! Plaintext must be UTF-8. Plaintext that decodes to a YAML mapping or
//! sequence is substituted as structure. Anything else stays a trimmed string.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::string::FromUtf8Error;

use tmpl_secrets::Decryptor;
use tmpl_source::CancellationToken;

use crate::{ConfigTree, Error, Result};

/// Key suffix that marks a secret reference
pub const SECRET_SUFFIX: &str = ".enc";

type Resolving<'s> = Pin<Box<dyn Future<Output = Result<ConfigTree>> + Send + 's>>;

/// Replaces secret references in one values tree
pub struct TreeDecryptor<'a> {
    decryptor: &'a dyn Decryptor,
    cancel: &'a CancellationToken,
    base_dir: Option<&'a Path>,
    origin: &'a str,
}

impl<'a> TreeDecryptor<'a> {
    /// `base_dir` anchors relative secret paths, normally the directory of
    /// the values file. Without it relative paths are used as given.
    /// `origin` names the values file in errors and logs.
    pub fn new(
        decryptor: &'a dyn Decryptor,
        cancel: &'a CancellationToken,
        base_dir: Option<&'a Path>,
        origin: &'a str,
    ) -> Self {
        Self {
            decryptor,
            cancel,
            base_dir,
            origin,
        }
    }

    /// Decrypt every secret reference in `tree`.
    ///
    /// Mapping entries are visited in key order, so for a given tree the
    /// decryptor always sees the same sequence of files. The first failure
    /// stops the walk.
    pub async fn resolve(&self, tree: ConfigTree) -> Result<ConfigTree> {
        self.walk(tree).await
    }

    fn walk<'s>(&'s self, node: ConfigTree) -> Resolving<'s> {
        Box::pin(async move {
            match node {
                ConfigTree::Mapping(entries) => {
                    let mut resolved = BTreeMap::new();
                    for (key, value) in entries {
                        let (name, value) = match key.strip_suffix(SECRET_SUFFIX) {
                            Some(name) => {
                                (name.to_string(), self.decrypt_entry(&key, value).await?)
                            }
                            None => (key, self.walk(value).await?),
                        };
                        // `name` sorts before `name.enc`, so a plain sibling is already present
                        if resolved.contains_key(&name) {
                            return Err(Error::DuplicateKey {
                                key: name,
                                origin: self.origin.to_string(),
                            });
                        }
                        resolved.insert(name, value);
                    }
                    Ok(ConfigTree::Mapping(resolved))
                }
                ConfigTree::Sequence(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.walk(item).await?);
                    }
                    Ok(ConfigTree::Sequence(resolved))
                }
                scalar => Ok(scalar),
            }
        })
    }

    async fn decrypt_entry(&self, key: &str, value: ConfigTree) -> Result<ConfigTree> {
        let reference = match value {
            ConfigTree::String(reference) => reference,
            other => {
                return Err(Error::SecretNotString {
                    key: key.to_string(),
                    origin: self.origin.to_string(),
                    found: other.kind(),
                });
            }
        };

        let path = self.secret_path(&reference);
        tracing::debug!(
            key,
            path = %path.display(),
            origin = self.origin,
            "Decrypting secret reference"
        );

        let plaintext = self
            .decryptor
            .decrypt_file(self.cancel, &path)
            .await
            .map_err(|source| Error::Decrypt {
                reference: reference.clone(),
                origin: self.origin.to_string(),
                source,
            })?;
        interpret_plaintext(plaintext).map_err(|source| Error::SecretEncoding {
            reference,
            origin: self.origin.to_string(),
            source,
        })
    }

    fn secret_path(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match self.base_dir {
            Some(base) if !reference.is_empty() && path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn interpret_plaintext(plaintext: Vec<u8>) -> std::result::Result<ConfigTree, FromUtf8Error> {
    let text = String::from_utf8(plaintext)?;
    let text = text.trim();
    Ok(match ConfigTree::from_yaml_str(text) {
        Ok(tree @ (ConfigTree::Mapping(_) | ConfigTree::Sequence(_))) => tree,
        _ => ConfigTree::String(text.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(b"secret123\n", ConfigTree::from("secret123"))]
    #[case(b"  \n", ConfigTree::from(""))]
    #[case(b"", ConfigTree::from(""))]
    #[case(b"42", ConfigTree::from("42"))]
    #[case(b"true", ConfigTree::from("true"))]
    #[case(b"not: [valid", ConfigTree::from("not: [valid"))]
    fn scalar_plaintext_stays_a_string(#[case] plaintext: &[u8], #[case] expected: ConfigTree) {
        assert_eq!(interpret_plaintext(plaintext.to_vec()).unwrap(), expected);
    }

    #[test]
    fn non_utf8_plaintext_is_an_error() {
        assert!(interpret_plaintext(vec![b'o', b'k', 0xff]).is_err());
    }

    #[test]
    fn structured_plaintext_becomes_a_subtree() {
        let tree = interpret_plaintext(b"user: admin\npassword: hunter2\n".to_vec()).unwrap();
        assert_eq!(tree.get("user").and_then(ConfigTree::as_str), Some("admin"));
        assert_eq!(tree.get("password").and_then(ConfigTree::as_str), Some("hunter2"));

        let list = interpret_plaintext(b"- a\n- b\n".to_vec()).unwrap();
        assert_eq!(
            list,
            ConfigTree::from(vec![ConfigTree::from("a"), ConfigTree::from("b")])
        );
    }

    #[test]
    fn relative_references_resolve_against_base_dir() {
        let decryptor = tmpl_test_utils::StaticDecryptor::new();
        let cancel = CancellationToken::new();
        let base = Path::new("/charts/app");
        let resolver = TreeDecryptor::new(&decryptor, &cancel, Some(base), "values.yaml");

        assert_eq!(
            resolver.secret_path("secrets/db.enc"),
            PathBuf::from("/charts/app/secrets/db.enc")
        );
        assert_eq!(
            resolver.secret_path("/etc/secret.enc"),
            PathBuf::from("/etc/secret.enc")
        );
        assert_eq!(resolver.secret_path(""), PathBuf::new());
    }

    #[test]
    fn relative_references_pass_through_without_base_dir() {
        let decryptor = tmpl_test_utils::StaticDecryptor::new();
        let cancel = CancellationToken::new();
        let resolver = TreeDecryptor::new(&decryptor, &cancel, None, "oci://registry/values:1");

        assert_eq!(
            resolver.secret_path("secrets/db.enc"),
            PathBuf::from("secrets/db.enc")
        );
    }
}
