use std::path::Path;

use anyhow::{Context, Result};
use vitrine::{VitrineConfig, VitrineService};

/// Load the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<VitrineConfig> {
    match path {
        Some(path) => VitrineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(VitrineConfig::default()),
    }
}

/// Create a service without building anything.
pub fn create_service(config_path: Option<&Path>) -> Result<VitrineService> {
    let config = load_config(config_path)?;
    VitrineService::new(config).context("Failed to initialize backends")
}

/// Open a service with a served generation, reusing the persisted one when
/// the catalog is unchanged.
pub async fn open_service(config_path: Option<&Path>) -> Result<VitrineService> {
    let config = load_config(config_path)?;
    VitrineService::open(config)
        .await
        .context("Failed to bring up an index generation")
}
