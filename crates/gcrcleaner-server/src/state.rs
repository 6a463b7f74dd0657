//! Shared state for the service handlers.

use std::sync::Arc;

use gcrcleaner_core::cache::DedupCache;
use gcrcleaner_engine::Cleaner;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The cleaning engine.
    pub cleaner: Arc<Cleaner>,
    /// Deduplication cache for the message-bus entry point.
    pub cache: Arc<dyn DedupCache>,
}

impl AppState {
    /// Creates service state from its collaborators.
    #[must_use]
    pub fn new(cleaner: Arc<Cleaner>, cache: Arc<dyn DedupCache>) -> Self {
        Self { cleaner, cache }
    }
}
