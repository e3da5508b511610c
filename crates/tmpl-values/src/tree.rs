//! In-memory representation of decoded values
//!
//! [`ConfigTree`] is a YAML document with string keys. Mappings are kept in a
//! `BTreeMap` so iteration order is lexicographic, which makes secret
//! decryption order and serialized output reproducible.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

/// Error produced while decoding YAML text into a [`ConfigTree`]
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("mapping keys must be scalars, found {0}")]
    UnsupportedKey(&'static str),
}

/// A decoded values document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigTree {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
    Sequence(Vec<ConfigTree>),
    Mapping(BTreeMap<String, ConfigTree>),
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigTree {
    /// An empty mapping
    pub fn empty() -> Self {
        Self::Mapping(BTreeMap::new())
    }

    /// Decode a single YAML document.
    ///
    /// An empty document decodes to [`ConfigTree::Null`]. Merge keys
    /// (`<<: *anchor`) are resolved, with explicit keys winning over merged
    /// ones. Tags are dropped and scalar keys (numbers, booleans, null) are
    /// converted to their string form.
    pub fn from_yaml_str(text: &str) -> Result<Self, ParseError> {
        let mut value: Value = serde_yaml::from_str(text)?;
        value.apply_merge()?;
        Self::try_from(value)
    }

    /// Render as a YAML document.
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Human-readable name of the node type, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, ConfigTree>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a nested mapping entry by a dot-separated path.
    ///
    /// ```rust
    /// use tmpl_values::ConfigTree;
    ///
    /// let tree = ConfigTree::from_yaml_str("db:\n  host: localhost\n").unwrap();
    /// assert_eq!(tree.get("db.host").and_then(ConfigTree::as_str), Some("localhost"));
    /// ```
    pub fn get(&self, path: &str) -> Option<&ConfigTree> {
        path.split('.')
            .try_fold(self, |node, segment| node.as_mapping()?.get(segment))
    }
}

impl TryFrom<Value> for ConfigTree {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Mapping(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key_string(key)?, Self::try_from(value)?);
                }
                Self::Mapping(map)
            }
            Value::Tagged(tagged) => Self::try_from(tagged.value)?,
        })
    }
}

fn key_string(key: Value) -> Result<String, ParseError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Tagged(tagged) => key_string(tagged.value),
        Value::Sequence(_) => Err(ParseError::UnsupportedKey("sequence")),
        Value::Mapping(_) => Err(ParseError::UnsupportedKey("mapping")),
    }
}

impl From<ConfigTree> for Value {
    fn from(tree: ConfigTree) -> Self {
        match tree {
            ConfigTree::Null => Value::Null,
            ConfigTree::Bool(b) => Value::Bool(b),
            ConfigTree::Number(n) => Value::Number(n),
            ConfigTree::String(s) => Value::String(s),
            ConfigTree::Sequence(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            ConfigTree::Mapping(entries) => Value::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (Value::String(key), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ConfigTree {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigTree {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConfigTree {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigTree {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<BTreeMap<String, ConfigTree>> for ConfigTree {
    fn from(value: BTreeMap<String, ConfigTree>) -> Self {
        Self::Mapping(value)
    }
}

impl From<Vec<ConfigTree>> for ConfigTree {
    fn from(value: Vec<ConfigTree>) -> Self {
        Self::Sequence(value)
    }
}
