//! Secret decryption for tmpl values files
//!
//! Decryption is delegated to an external tool behind the [`Decryptor`]
//! trait. [`SopsDecryptor`] shells out to the `sops` CLI; the binary is
//! located when the decryptor is built, so a missing tool is reported at
//! setup time rather than on the first secret.

pub mod decryptor;
pub mod error;
pub mod sops;

pub use decryptor::Decryptor;
pub use error::{Error, Result};
pub use sops::SopsDecryptor;
