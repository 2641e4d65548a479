use std::path::Path;

use anyhow::{Result, bail};
use vitrine::{ImagePayload, VisionSearchRequest};

use crate::cli::ImageCommand;
use crate::context;
use crate::output::{self, OutputFormat};

/// Execute an image search command.
pub async fn run(
    cmd: ImageCommand,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let payload = match (cmd.source.path, cmd.source.url) {
        (Some(path), None) => ImagePayload::Path(path),
        (None, Some(url)) => ImagePayload::Url(url),
        _ => bail!("Exactly one of --path or --url is required."),
    };

    let service = context::open_service(config_path).await?;
    let request = VisionSearchRequest {
        payload,
        top_k: cmd.top_k,
    };
    let response = service.vision_search(&request).await;
    output::print_search_response(&response, format)
}
