use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Vitrine - hybrid catalog retrieval CLI
#[derive(Parser)]
#[command(name = "vitrine", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, env = "VITRINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build (or reuse) and persist an index generation.
    Build {
        /// Rebuild even if the catalog has not changed.
        #[arg(long)]
        force: bool,
    },
    /// Search the catalog with free text.
    Search(SearchCommand),
    /// Search the catalog with an image.
    Image(ImageCommand),
    /// Show the current index generation.
    Info,
}

// --- Search ---

#[derive(Parser)]
pub struct SearchCommand {
    /// Free-text query.
    pub query: String,

    /// Category constraint (e.g. shoes).
    #[arg(long)]
    pub category: Option<String>,

    /// Color constraint (e.g. black).
    #[arg(long)]
    pub color: Option<String>,

    /// Inclusive lower price bound.
    #[arg(long)]
    pub min_price: Option<f64>,

    /// Inclusive upper price bound.
    #[arg(long)]
    pub max_price: Option<f64>,

    /// Maximum number of results.
    #[arg(long)]
    pub top_k: Option<usize>,
}

// --- Image ---

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ImageSourceArgs {
    /// Local image file.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Image URL.
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Parser)]
pub struct ImageCommand {
    #[command(flatten)]
    pub source: ImageSourceArgs,

    /// Maximum number of results.
    #[arg(long)]
    pub top_k: Option<usize>,
}
