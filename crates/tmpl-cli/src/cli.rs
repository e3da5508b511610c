//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// tmpl - resolve chart values from local and remote sources
#[derive(Parser, Debug)]
#[command(name = "tmpl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter, e.g. `info`, `debug` or `tmpl_source=trace`
    #[arg(long, global = true, env = "TMPL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Resolve and print the merged values for a chart
    ///
    /// Examples:
    ///   tmpl values ./chart
    ///   tmpl values ./chart -f prod.yaml -f s3://config/prod/values.yaml
    ///   tmpl values ./chart --env-file prod.env -o rendered.yaml
    Values {
        /// Chart directory containing values.yaml
        #[arg(default_value = ".")]
        chart: PathBuf,

        /// Extra values files merged in order (local path, git+, s3:// or oci://)
        #[arg(short = 'f', long = "values")]
        values: Vec<String>,

        /// Env files overlaid on the process environment for ${NAME} expansion
        #[arg(long = "env-file")]
        env_files: Vec<PathBuf>,

        /// Output file, `-` for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },

    /// Print version information
    Version {
        #[arg(short, long, value_enum, default_value_t = VersionFormat::Text)]
        output: VersionFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionFormat {
    Text,
    Json,
}
