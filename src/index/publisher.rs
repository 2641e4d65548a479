//! The currently served generation.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::index::generation::IndexGeneration;

/// Holds the served generation behind a single swappable reference.
///
/// Readers clone the `Arc` and drop the lock immediately, so a query keeps
/// using the generation it started with even if a rebuild publishes a new one
/// meanwhile.
#[derive(Debug, Default)]
pub struct IndexPublisher {
    current: RwLock<Option<Arc<IndexGeneration>>>,
}

impl IndexPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<IndexGeneration>> {
        self.current.read().clone()
    }

    /// Swap in `generation`, returning the one it replaces.
    pub fn publish(&self, generation: Arc<IndexGeneration>) -> Option<Arc<IndexGeneration>> {
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, Some(generation))
    }
}
