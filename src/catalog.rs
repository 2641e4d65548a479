//! Catalog data model: items, canonical vocabularies, and the immutable store
//! that backs one index generation.

pub mod item;
pub mod loader;
pub mod store;
pub mod vocabulary;

pub use item::{Item, RawItem};
pub use loader::CatalogLoader;
pub use store::CatalogStore;
pub use vocabulary::{Category, Color};
