use anyhow::Result;
use clap::ValueEnum;
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vitrine::{
    GenerationInfo, RankedItem, RebuildReport, Relaxation, SearchOutcome, SearchResponse,
};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Table,
    /// JSON output.
    Json,
}

/// Print a ranked response.
pub fn print_search_response(response: &SearchResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Table => {
            if let Some(Relaxation::Color { color }) = response.relaxation {
                println!("No exact matches in {color}; showing other colors.");
            }
            if let Some(color) = response.detected_color {
                println!("Detected color: {color}");
            }
            match &response.outcome {
                SearchOutcome::Degraded { reason } => {
                    println!("Search degraded: {reason}");
                    return Ok(());
                }
                SearchOutcome::NoMatches => {
                    println!("No matching items found.");
                    return Ok(());
                }
                SearchOutcome::Matched => {}
            }

            let rows: Vec<HitRow> = response.hits.iter().map(HitRow::from).collect();
            let table = Table::new(&rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
    }
    Ok(())
}

/// Print the result of a build command.
pub fn print_report(report: &RebuildReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            if report.reused {
                println!("Catalog unchanged, reused generation {}.", report.generation.id);
            } else {
                println!("Built generation {}.", report.generation.id);
            }
            if !report.persisted {
                println!("Warning: the generation could not be written to the cache directory.");
            }
            print_generation_table(&report.generation);
        }
    }
    Ok(())
}

/// Print the current generation, if any.
pub fn print_info(info: Option<&GenerationInfo>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = match info {
                Some(info) => serde_json::to_value(info)?,
                None => json!(null),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => match info {
            Some(info) => print_generation_table(info),
            None => println!("No index generation found. Run 'build' first."),
        },
    }
    Ok(())
}

fn print_generation_table(info: &GenerationInfo) {
    let rows = vec![
        PropertyRow::new("Generation", info.id.to_string()),
        PropertyRow::new("Built at", info.built_at.to_rfc3339()),
        PropertyRow::new("Items", info.items.to_string()),
        PropertyRow::new("Text backend", info.text_backend.clone()),
        PropertyRow::new(
            "Vision backend",
            info.vision_backend.clone().unwrap_or_else(|| "-".to_string()),
        ),
        PropertyRow::new("Images", info.images.to_string()),
    ];
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

// --- Helper types ---

#[derive(Tabled)]
struct HitRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Score")]
    score: String,
}

impl From<&RankedItem> for HitRow {
    fn from(hit: &RankedItem) -> Self {
        let item = &hit.item;
        Self {
            id: item.id.clone(),
            title: truncate(&item.title, 60),
            category: item.category.map_or("-".to_string(), |c| c.to_string()),
            color: item.color.map_or("-".to_string(), |c| c.to_string()),
            price: format!("{:.2}", item.price),
            score: format!("{:.4}", hit.score),
        }
    }
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl PropertyRow {
    fn new(property: &str, value: String) -> Self {
        Self {
            property: property.to_string(),
            value,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
