use std::path::Path;

use anyhow::{Context, Result};
use vitrine::index::GenerationStore;

use crate::context;
use crate::output::{self, OutputFormat};

/// Show the persisted generation without building one.
pub fn run(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = context::load_config(config_path)?;
    let store = GenerationStore::new(&config.cache.dir);
    let generation = store
        .load_current()
        .context("Failed to read the persisted generation")?;
    output::print_info(generation.map(|g| g.info()).as_ref(), format)
}
