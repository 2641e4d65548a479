use std::path::Path;

use anyhow::{Context, Result};

use crate::context;
use crate::output::{self, OutputFormat};

/// Execute a build command.
pub async fn run(force: bool, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let service = context::create_service(config_path)?;
    let report = service
        .rebuild(force)
        .await
        .context("Index build failed")?;
    output::print_report(&report, format)
}
