//! `tmpl version`

use serde::Serialize;

use crate::cli::VersionFormat;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

const INFO: VersionInfo = VersionInfo {
    name: "tmpl",
    version: env!("CARGO_PKG_VERSION"),
};

pub fn run_version(format: VersionFormat) -> Result<()> {
    println!("{}", render(format)?);
    Ok(())
}

fn render(format: VersionFormat) -> Result<String> {
    Ok(match format {
        VersionFormat::Text => format!("{} {}", INFO.name, INFO.version),
        VersionFormat::Json => serde_json::to_string_pretty(&INFO)?,
    })
}
