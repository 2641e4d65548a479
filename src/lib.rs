//! # Vitrine
//!
//! Hybrid retrieval and ranking engine for catalog shopping assistants.
//!
//! ## Features
//!
//! - Text and image queries over one immutable index generation
//! - Backend fallback per build: remote embeddings, local hashed encoder, TF-IDF
//! - Image fallback from deep visual embeddings to HSV histograms
//! - Hard category/color/price filters with color-only relaxation
//! - Deterministic score fusion (tags, price, color, category prior)
//! - Atomically swapped generations, persisted with checksums
//!
//! ```no_run
//! use vitrine::{TextSearchRequest, VitrineConfig, VitrineService};
//!
//! # async fn demo() -> vitrine::Result<()> {
//! let service = VitrineService::open(VitrineConfig::default()).await?;
//! let response = service
//!     .text_search(&TextSearchRequest::new("running shoes").max_price(100.0))
//!     .await;
//! for hit in &response.hits {
//!     println!("{} {:.3}", hit.item.id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod embedding;
mod error;
pub mod index;
pub mod search;
mod service;
pub mod vector;
pub mod vision;

// Re-exports for the public API
pub use catalog::{CatalogLoader, CatalogStore, Category, Color, Item, RawItem};
pub use config::VitrineConfig;
pub use embedding::{BackendIdentity, BackendKind, ImageEncoder, TextEncoder};
pub use error::{BackendAttempt, Result, VitrineError};
pub use index::{BackendSelector, GenerationInfo, IndexGeneration};
pub use search::{
    ImagePayload, RankedItem, Relaxation, SearchOutcome, SearchResponse, TextSearchRequest,
    VisionSearchRequest,
};
pub use service::{RebuildReport, VitrineService};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
