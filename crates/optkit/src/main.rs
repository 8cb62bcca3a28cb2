use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use optkit_config::TomlSchema;

fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let output_format = cli.format.clone();

    let file = match cli.file {
        Some(path) => path,
        None => commands::default_config_path()?,
    };
    let schema = match &cli.schema {
        Some(path) => TomlSchema::load(path)?,
        None => TomlSchema::default(),
    };
    let target = commands::Target {
        file,
        schema,
        sysconf: cli.sysconf,
    };

    match cli.command {
        Commands::Get { path } => commands::handle_get(&target, &path, output_format),
        Commands::Set { path, value } => commands::handle_set(&target, &path, &value),
        Commands::Dump => commands::handle_dump(&target, output_format),
        Commands::Check => commands::handle_check(&target, output_format),
    }
}
