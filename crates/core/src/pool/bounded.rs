//! Semaphore-bounded task pool implementation.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use super::types::PoolStatus;

/// Returned by [`BoundedTaskPool::submit`] when the pool no longer accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Task pool is closed")]
pub struct PoolClosed;

/// Tracks counters for a pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    waiting: AtomicUsize,
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active: self.active.load(Ordering::Relaxed),
            peak_active: self.peak_active.load(Ordering::Relaxed),
            max_concurrent,
            waiting: self.waiting.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counts a submitter as waiting until dropped, including when the
/// `submit` future is abandoned.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Read-only handle on a pool's counters that stays usable after the pool
/// was drained.
#[derive(Clone)]
pub struct PoolMonitor {
    name: String,
    max_concurrent: usize,
    stats: Arc<PoolStats>,
}

impl PoolMonitor {
    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(&self.name, self.max_concurrent)
    }
}

/// Runs units of work with a fixed concurrency budget.
///
/// Failures do not cancel siblings. The first failure (in completion order)
/// is kept and returned by [`drain`](Self::drain) once every unit settled.
pub struct BoundedTaskPool<E> {
    name: String,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<()>,
    first_error: Arc<Mutex<Option<E>>>,
    panic: Option<Box<dyn Any + Send + 'static>>,
    stats: Arc<PoolStats>,
}

impl<E: Send + 'static> BoundedTaskPool<E> {
    /// Creates a pool running at most `max_concurrent` units at once.
    ///
    /// A budget of zero is raised to one.
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            name: name.into(),
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            tasks: JoinSet::new(),
            first_error: Arc::new(Mutex::new(None)),
            panic: None,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the current counters.
    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(&self.name, self.max_concurrent)
    }

    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor {
            name: self.name.clone(),
            max_concurrent: self.max_concurrent,
            stats: Arc::clone(&self.stats),
        }
    }

    /// Submits a unit of work.
    ///
    /// Waits until fewer than `max_concurrent` units are running, then starts
    /// `work` and returns. Waiting submitters are served in arrival order.
    pub async fn submit<F>(&mut self, work: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let permit = {
            let _waiting = WaitingGuard::new(&self.stats.waiting);
            Arc::clone(&self.semaphore).acquire_owned().await
        };
        let permit = permit.map_err(|_| PoolClosed)?;

        let active = self.stats.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.peak_active.fetch_max(active, Ordering::Relaxed);
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        trace!(pool = %self.name, active, "Unit started");

        let stats = Arc::clone(&self.stats);
        let first_error = Arc::clone(&self.first_error);

        self.tasks.spawn(async move {
            let result = work.await;
            stats.active.fetch_sub(1, Ordering::Relaxed);

            match result {
                Ok(()) => {
                    stats.succeeded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    let mut slot = first_error.lock().await;
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                }
            }

            drop(permit);
        });

        self.reap_finished();
        Ok(())
    }

    /// Waits for every submitted unit to settle.
    ///
    /// Returns the final counters, or the first failure recorded by any unit.
    /// A unit that panicked has its panic resumed here, after the others
    /// settled.
    pub async fn drain(mut self) -> Result<PoolStatus, E> {
        debug!(pool = %self.name, pending = self.tasks.len(), "Draining pool");

        while let Some(joined) = self.tasks.join_next().await {
            self.record_join(joined);
        }

        if let Some(payload) = self.panic.take() {
            std::panic::resume_unwind(payload);
        }

        let status = self.status();
        match self.first_error.lock().await.take() {
            Some(e) => Err(e),
            None => Ok(status),
        }
    }

    /// Collects already-finished tasks so the join set does not grow with
    /// the number of units.
    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record_join(joined);
        }
    }

    fn record_join(&mut self, joined: Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() && self.panic.is_none() {
                self.panic = Some(e.into_panic());
            }
        }
    }
}
