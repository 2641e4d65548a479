mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::{build, image, info, search};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let config = cli.config.as_deref();

    match cli.command {
        Command::Build { force } => build::run(force, config, format).await,
        Command::Search(cmd) => search::run(cmd, config, format).await,
        Command::Image(cmd) => image::run(cmd, config, format).await,
        Command::Info => info::run(config, format),
    }
}
