//! Time-bounded membership cache for message deduplication.
//!
//! Message buses deliver at-least-once; the cleaner is idempotent but a
//! redelivered message would still trigger a full (and expensive) clean.
//! The cache remembers recently-seen message ids for a configurable
//! lifetime so redeliveries can be acknowledged without side effects.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

/// Membership cache consulted before processing a bus message.
pub trait DedupCache: Send + Sync {
    /// Inserts the key, returning `true` if it was already present.
    fn insert(&self, key: &str) -> bool;

    /// Cancels all pending expiries. The cache must not be used afterwards.
    fn stop(&self);
}

/// [`DedupCache`] implementation that expires entries after a fixed lifetime.
///
/// Each inserted key owns one spawned expiry task; a shared stop signal
/// cancels every pending expiry so no background work outlives the process.
/// Must be used from within a tokio runtime.
pub struct TimerCache {
    entries: Arc<Mutex<HashSet<String>>>,
    lifetime: Duration,
    stop_tx: watch::Sender<bool>,
}

impl TimerCache {
    /// Creates a cache whose entries expire after `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            entries: Arc::new(Mutex::new(HashSet::new())),
            lifetime,
            stop_tx,
        }
    }
}

impl DedupCache for TimerCache {
    fn insert(&self, key: &str) -> bool {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !entries.insert(key.to_string()) {
            return true;
        }
        drop(entries);

        let entries = Arc::clone(&self.entries);
        let mut stop_rx = self.stop_tx.subscribe();
        let lifetime = self.lifetime;
        let key = key.to_string();

        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(lifetime) => {
                    entries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&key);
                }
                _ = stop_rx.changed() => {}
            }
        });

        false
    }

    fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
