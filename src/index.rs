//! Index generations: building, publishing, and persisting them.

pub mod generation;
pub mod persist;
pub mod publisher;
pub mod selector;

pub use self::generation::{
    GenerationInfo, IndexGeneration, TextSection, VisionEntry, VisionSection,
};
pub use self::persist::GenerationStore;
pub use self::publisher::IndexPublisher;
pub use self::selector::{BackendSelector, BackendSelectorBuilder};
