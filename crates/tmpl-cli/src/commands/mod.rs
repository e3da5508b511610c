//! Command implementations

mod values;
mod version;

pub use values::run_values;
pub use version::run_version;
