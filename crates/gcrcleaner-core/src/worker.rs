//! Ordered, bounded-concurrency task pool.
//!
//! Work is admitted in submission order and executed with at most the
//! configured parallelism. Completion order is unconstrained; the vector
//! handed back by [`WorkerPool::done`] is re-indexed by submission order so
//! callers can correlate results with the work they enqueued.
//!
//! Admission is gated by a counting semaphore: [`WorkerPool::submit`] parks
//! until a slot frees up, which gives natural backpressure against the
//! underlying transport. Dropping a parked `submit` future abandons the
//! enqueue; an abandoned enqueue never appears in the results.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, Semaphore};

/// Error returned once the pool has been stopped by [`WorkerPool::done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker pool is stopped")]
pub struct PoolStopped;

/// Ordered, bounded-concurrency task pool.
///
/// Tasks return `Result<T, E>`; the pool records each outcome under the
/// index assigned at admission and materializes a dense, enqueue-ordered
/// vector when drained.
///
/// A task must never submit to its own pool: with every slot occupied by
/// tasks waiting on admission, nothing can make progress.
pub struct WorkerPool<T, E> {
    permits: u32,
    sem: Arc<Semaphore>,
    next_index: AtomicUsize,
    results: Arc<Mutex<Vec<(usize, Result<T, E>)>>>,
    stopped: AtomicBool,
}

impl<T, E> WorkerPool<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates a pool executing at most `concurrency` tasks at a time.
    ///
    /// A `concurrency` of zero defaults to one task per available CPU core.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        let concurrency = if concurrency == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            concurrency
        };
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);

        Self {
            permits,
            sem: Arc::new(Semaphore::new(concurrency)),
            next_index: AtomicUsize::new(0),
            results: Arc::new(Mutex::new(Vec::new())),
            stopped: AtomicBool::new(false),
        }
    }

    /// Number of tasks the pool executes in parallel.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.permits as usize
    }

    /// Schedules a task, parking until an execution slot is available.
    ///
    /// Returns once the task has been handed to the executor; the task's
    /// outcome is only observable through [`WorkerPool::done`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolStopped`] if the pool was stopped, including while this
    /// call was parked on admission.
    pub async fn submit<F>(&self, task: F) -> Result<(), PoolStopped>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        if self.is_stopped() {
            return Err(PoolStopped);
        }

        let permit = Arc::clone(&self.sem)
            .acquire_owned()
            .await
            .map_err(|_| PoolStopped)?;

        // The pool may have stopped while this call was parked.
        if self.is_stopped() {
            drop(permit);
            return Err(PoolStopped);
        }

        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        let results = Arc::clone(&self.results);

        tokio::spawn(async move {
            let outcome = task.await;
            results.lock().await.push((index, outcome));
            drop(permit);
        });

        Ok(())
    }

    /// Parks until all currently-scheduled work has completed.
    ///
    /// Does not stop the pool; further submissions are permitted.
    ///
    /// # Errors
    ///
    /// Returns [`PoolStopped`] if the pool was stopped.
    pub async fn wait(&self) -> Result<(), PoolStopped> {
        if self.is_stopped() {
            return Err(PoolStopped);
        }

        let all = self
            .sem
            .acquire_many(self.permits)
            .await
            .map_err(|_| PoolStopped)?;
        drop(all);

        Ok(())
    }

    /// Stops the pool, waits for outstanding work, and returns all results
    /// indexed by submission order.
    ///
    /// # Errors
    ///
    /// Returns [`PoolStopped`] on every call after the first.
    pub async fn done(&self) -> Result<Vec<Result<T, E>>, PoolStopped> {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PoolStopped);
        }

        let all = self
            .sem
            .acquire_many(self.permits)
            .await
            .map_err(|_| PoolStopped)?;
        drop(all);

        let mut collected = std::mem::take(&mut *self.results.lock().await);
        collected.sort_unstable_by_key(|(index, _)| *index);

        Ok(collected.into_iter().map(|(_, outcome)| outcome).collect())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
