//! Error types for the cleaning engine.

use std::collections::BTreeMap;

use gcrcleaner_core::worker::PoolStopped;
use gcrcleaner_registry::RegistryError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced while cleaning a repository.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Tag filter construction failed.
    #[error("invalid tag filter: {message}")]
    Filter {
        /// What made the filter invalid.
        message: String,
    },

    /// The request parameters were invalid.
    #[error("invalid request: {message}")]
    Request {
        /// What made the request invalid.
        message: String,
    },

    /// A registry operation failed terminally.
    #[error(transparent)]
    Registry {
        /// The transport failure.
        #[from]
        source: RegistryError,
    },

    /// A digest kept returning the dangling-parent signal after every retry
    /// pass.
    #[error("failed to delete {digest}: dangling parent persisted after retries")]
    DanglingParentExhausted {
        /// The digest that could not be deleted.
        digest: String,
    },

    /// The worker pool was used after it had been stopped.
    #[error("internal worker pool error: {source}")]
    Pool {
        /// The pool misuse.
        #[from]
        source: PoolStopped,
    },

    /// Several failures, deduplicated by message and sorted.
    #[error("{count} errors occurred:\n{messages}")]
    Aggregate {
        /// Number of distinct failures.
        count: usize,
        /// Newline-joined failure messages.
        messages: String,
    },
}

impl EngineError {
    /// Folds a list of errors into one.
    ///
    /// An empty list folds to `None`; a single distinct message is returned
    /// verbatim; several are deduplicated by message, sorted, and joined
    /// one per line.
    #[must_use]
    pub fn aggregate(errors: Vec<EngineError>) -> Option<EngineError> {
        let mut by_message: BTreeMap<String, EngineError> = BTreeMap::new();
        for err in errors {
            by_message.entry(err.to_string()).or_insert(err);
        }

        match by_message.len() {
            0 => None,
            1 => by_message.into_values().next(),
            count => {
                let messages = by_message.keys().cloned().collect::<Vec<_>>().join("\n");
                Some(EngineError::Aggregate { count, messages })
            }
        }
    }
}
