//! `tmpl values`: resolve and print the merged values for a chart

use std::path::{Path, PathBuf};

use tmpl_values::{CancellationToken, ConfigTree, Loader, LoaderConfig};

use crate::error::{CliError, Result};

const STDOUT: &str = "-";

pub fn run_values(
    chart: &Path,
    values: &[String],
    env_files: Vec<PathBuf>,
    output: &str,
) -> Result<()> {
    if output.is_empty() {
        return Err(CliError::user("Output path must not be empty, use '-' for stdout"));
    }

    let loader = Loader::new(LoaderConfig { env_files })?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let tree = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling values load");
                    cancel.cancel();
                }
            })
        };

        let result = loader.load(&cancel, chart, values).await;
        interrupt.abort();
        result
    })?;

    write_values(&tree, output)
}

fn write_values(tree: &ConfigTree, output: &str) -> Result<()> {
    let rendered = tree.to_yaml_string()?;
    if output == STDOUT {
        print!("{rendered}");
    } else {
        std::fs::write(output, rendered)?;
        tracing::info!(path = output, "Wrote values");
    }
    Ok(())
}
