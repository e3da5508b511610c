//! Values resolution pipeline for tmpl charts
//!
//! Values are assembled from a chart's `values.yaml` and any number of extra
//! files, local or remote. Each file goes through the same stages:
//!
//! 1. classify the reference and read or fetch its bytes
//! 2. expand `${NAME}` placeholders ([`EnvResolver`])
//! 3. decode YAML into a [`ConfigTree`]
//! 4. decrypt `.enc` secret references ([`TreeDecryptor`])
//! 5. deep-merge into the accumulated values ([`merge`])
//!
//! [`Loader`] drives the stages in caller order and stops at the first error.

pub mod decrypt;
pub mod env;
pub mod error;
pub mod loader;
pub mod merge;
pub mod tree;

pub use decrypt::{SECRET_SUFFIX, TreeDecryptor};
pub use env::EnvResolver;
pub use error::{Error, Result};
pub use loader::{Loader, LoaderConfig, VALUES_FILE};
pub use merge::{merge, merge_all};
pub use tree::{ConfigTree, ParseError};

pub use tmpl_source::CancellationToken;
