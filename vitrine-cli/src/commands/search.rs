use std::path::Path;

use anyhow::Result;
use vitrine::TextSearchRequest;

use crate::cli::SearchCommand;
use crate::context;
use crate::output::{self, OutputFormat};

/// Execute a text search command.
pub async fn run(
    cmd: SearchCommand,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let service = context::open_service(config_path).await?;

    let request = TextSearchRequest {
        query: cmd.query,
        category: cmd.category,
        color: cmd.color,
        min_price: cmd.min_price,
        max_price: cmd.max_price,
        top_k: cmd.top_k,
    };
    let response = service.text_search(&request).await;
    output::print_search_response(&response, format)
}
