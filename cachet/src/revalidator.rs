//! Background revalidation worker pool.
//!
//! Serving stale under `stale-while-revalidate` submits a refresh task
//! here instead of blocking the caller. The pool enforces:
//!
//! - **single-flight per key** — a key already queued or running is never
//!   queued again; the stale response is simply served;
//! - **bounded pending work** — tasks beyond the queue bound are dropped
//!   (the caller already has its stale response, so dropping is safe);
//! - **bounded workers** — at most `asynchronous_workers_max` tasks run
//!   concurrently; surplus workers exit after sitting idle for the
//!   configured lifetime, shrinking the pool back to its core size.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::config::CacheConfig;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct RevalidationJob {
    key: String,
    task: BoxedTask,
}

struct RevalidatorInner {
    queue_tx: mpsc::Sender<RevalidationJob>,
    queue_rx: Mutex<mpsc::Receiver<RevalidationJob>>,
    /// Keys queued or currently revalidating. Entries are removed only
    /// after the task completes, which is what makes submission
    /// single-flight.
    queued: DashMap<String, ()>,
    workers: AtomicUsize,
    workers_core: usize,
    workers_max: usize,
    idle_lifetime: Duration,
}

/// Worker pool issuing background revalidations.
#[derive(Clone)]
pub struct AsynchronousRevalidator {
    inner: Arc<RevalidatorInner>,
}

impl AsynchronousRevalidator {
    /// Creates a pool sized by the cache configuration.
    ///
    /// Callers gate construction on `asynchronous_workers_max > 0`; a pool
    /// with zero workers would accept tasks and never run them.
    pub fn new(config: &CacheConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.revalidation_queue_size.max(1));
        Self {
            inner: Arc::new(RevalidatorInner {
                queue_tx,
                queue_rx: Mutex::new(queue_rx),
                queued: DashMap::new(),
                workers: AtomicUsize::new(0),
                workers_core: config.asynchronous_workers_core,
                workers_max: config.asynchronous_workers_max.max(1),
                idle_lifetime: config.asynchronous_worker_idle_lifetime,
            }),
        }
    }

    /// Submits a revalidation task for `key`.
    ///
    /// Returns `false` without running anything when a task for the key is
    /// already in flight or the pending queue is full.
    pub fn revalidate<F>(&self, key: impl Into<String>, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        if self.inner.queued.insert(key.clone(), ()).is_some() {
            debug!(key = %key, "revalidation already in flight");
            return false;
        }

        let job = RevalidationJob {
            key: key.clone(),
            task: Box::pin(task),
        };
        match self.inner.queue_tx.try_send(job) {
            Ok(()) => {
                self.spawn_worker_if_needed();
                true
            }
            Err(_) => {
                self.inner.queued.remove(&key);
                debug!(key = %key, "revalidation queue full, dropping task");
                false
            }
        }
    }

    /// Whether a task for `key` is queued or running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.queued.contains_key(key)
    }

    /// Number of keys queued or running.
    pub fn in_flight(&self) -> usize {
        self.inner.queued.len()
    }

    fn spawn_worker_if_needed(&self) {
        loop {
            let current = self.inner.workers.load(Ordering::Acquire);
            if current >= self.inner.workers_max {
                return;
            }
            if self
                .inner
                .workers
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(worker_loop(inner));
                return;
            }
        }
    }
}

impl std::fmt::Debug for AsynchronousRevalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsynchronousRevalidator")
            .field("workers", &self.inner.workers.load(Ordering::Relaxed))
            .field("in_flight", &self.inner.queued.len())
            .finish()
    }
}

async fn worker_loop(inner: Arc<RevalidatorInner>) {
    loop {
        let job = {
            let mut queue = inner.queue_rx.lock().await;
            match tokio::time::timeout(inner.idle_lifetime, queue.recv()).await {
                Ok(Some(job)) => Some(job),
                // Channel closed: the pool is gone.
                Ok(None) => break,
                Err(_idle) => None,
            }
        };
        match job {
            Some(job) => {
                debug!(key = %job.key, "running background revalidation");
                job.task.await;
                inner.queued.remove(&job.key);
            }
            None => {
                if inner.workers.load(Ordering::Acquire) > inner.workers_core {
                    break;
                }
            }
        }
    }
    inner.workers.fetch_sub(1, Ordering::AcqRel);
}
