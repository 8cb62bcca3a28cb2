use std::path::PathBuf;

use clap::{Parser, Subcommand};
use optkit_core::OutputFormat;

#[derive(Parser)]
#[command(name = "optkit")]
#[command(about = "optkit: inspect and edit typed, sectioned config files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to <config dir>/optkit/config.ini)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// TOML option schema declaring sections, types and defaults
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// System defaults file, applied before the config file
    #[arg(long)]
    pub sysconf: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the value of one option
    Get {
        /// Option path: <section>/<option>
        path: String,
    },

    /// Set an option and save the config file
    Set {
        /// Option path: <section>/<option>
        path: String,

        /// New value, in config file syntax
        value: String,
    },

    /// Print the whole effective configuration
    Dump,

    /// Parse the config file and report bad lines
    Check,
}
