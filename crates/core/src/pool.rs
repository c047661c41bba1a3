//! Bounded worker pool
//!
//! A fixed number of workers pull items from one bounded queue. Producers
//! block on `submit` while the queue is full. In fail mode the first handler
//! error is kept, the pool stops accepting work and queued items are skipped;
//! items already running are left to finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::options::{ErrorPolicy, RunOptions};

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 32;

/// Default capacity of the queue between producer and workers
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Sizing and error policy of a pool
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            error_policy: ErrorPolicy::Fail,
        }
    }
}

impl PoolOptions {
    /// Pool sized from run options
    pub fn from_run(options: &RunOptions) -> Self {
        Self {
            workers: options.parallel,
            queue_capacity: options.queue_capacity,
            error_policy: options.error_policy,
        }
    }

    /// Single worker, for operations that must keep listing order
    pub fn sequential(options: &RunOptions) -> Self {
        Self {
            workers: 1,
            ..Self::from_run(options)
        }
    }
}

/// Result of draining a pool
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Items whose handler succeeded
    pub completed: usize,
    /// Items whose handler failed
    pub failed: usize,
    /// Items dropped from the queue after the pool stopped
    pub skipped: usize,
    /// First recorded error (fail mode only)
    pub first_error: Option<Error>,
}

impl PoolOutcome {
    pub fn is_ok(&self) -> bool {
        self.first_error.is_none()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    stopped: AtomicBool,
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    first_error: Mutex<Option<Error>>,
}

impl PoolState {
    fn record(&self, error: Error) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Executor running `handler` over submitted items on N workers
pub struct WorkerPool<T> {
    tx: mpsc::Sender<T>,
    workers: JoinSet<()>,
    state: Arc<PoolState>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start the workers
    pub fn spawn<F, Fut>(options: PoolOptions, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let handler = Arc::new(handler);
        let state = Arc::new(PoolState::default());
        let policy = options.error_policy;

        let mut workers = JoinSet::new();
        for _ in 0..options.workers.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let state = Arc::clone(&state);
            workers.spawn(async move {
                loop {
                    let item = rx.lock().await.recv().await;
                    let Some(item) = item else { break };

                    if state.stopped.load(Ordering::SeqCst) {
                        state.skipped.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }

                    match handler(item).await {
                        Ok(()) => {
                            state.completed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            state.failed.fetch_add(1, Ordering::SeqCst);
                            match policy {
                                ErrorPolicy::Fail => state.record(e),
                                ErrorPolicy::Ignore => {
                                    tracing::debug!(error = %e, "Ignoring failed item");
                                }
                            }
                        }
                    }
                }
            });
        }

        Self { tx, workers, state }
    }

    /// Queue an item, waiting while the queue is full
    ///
    /// Returns false once the pool has stopped; the producer should stop too.
    pub async fn submit(&self, item: T) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.tx.send(item).await.is_ok()
    }

    /// Whether a recorded error stopped the pool
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Record an error raised outside the workers, e.g. by the producer
    pub fn fail(&self, error: Error) {
        self.state.record(error);
    }

    /// Close the queue, wait for every worker and collect the outcome
    pub async fn finish(self) -> PoolOutcome {
        let Self {
            tx,
            mut workers,
            state,
        } = self;
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                state.record(Error::General(format!("worker task failed: {e}")));
            }
        }

        let first_error = state
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        PoolOutcome {
            completed: state.completed.load(Ordering::SeqCst),
            failed: state.failed.load(Ordering::SeqCst),
            skipped: state.skipped.load(Ordering::SeqCst),
            first_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options(workers: usize, queue_capacity: usize, error_policy: ErrorPolicy) -> PoolOptions {
        PoolOptions {
            workers,
            queue_capacity,
            error_policy,
        }
    }

    #[tokio::test]
    async fn test_all_items_processed() {
        let sum = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&sum);
        let pool = WorkerPool::spawn(options(4, 2, ErrorPolicy::Fail), move |n: usize| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(n, Ordering::SeqCst);
                Ok(())
            }
        });

        for n in 1..=100 {
            assert!(pool.submit(n).await);
        }
        let outcome = pool.finish().await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.completed, 100);
        assert_eq!(sum.load(Ordering::SeqCst), 5050);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let pool = WorkerPool::spawn(options(3, 10, ErrorPolicy::Fail), move |_: usize| {
            let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        for n in 0..30 {
            pool.submit(n).await;
        }
        let outcome = pool.finish().await;

        assert_eq!(outcome.completed, 30);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_first_error_stops_the_pool() {
        let pool = WorkerPool::spawn(options(1, 1, ErrorPolicy::Fail), |n: usize| async move {
            if n == 0 {
                Err(Error::Network(format!("item {n} failed")))
            } else {
                Ok(())
            }
        });

        let mut accepted = 0;
        for n in 0..50 {
            if !pool.submit(n).await {
                break;
            }
            accepted += 1;
            tokio::task::yield_now().await;
        }
        let outcome = pool.finish().await;

        assert!(accepted < 50);
        assert_eq!(outcome.failed, 1);
        assert!(matches!(outcome.first_error, Some(Error::Network(ref m)) if m == "item 0 failed"));
    }

    #[tokio::test]
    async fn test_ignore_policy_keeps_going() {
        let pool = WorkerPool::spawn(options(2, 4, ErrorPolicy::Ignore), |n: usize| async move {
            if n % 2 == 0 {
                Err(Error::General("even".into()))
            } else {
                Ok(())
            }
        });

        for n in 0..10 {
            assert!(pool.submit(n).await);
        }
        let outcome = pool.finish().await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.completed, 5);
        assert_eq!(outcome.failed, 5);
    }

    #[tokio::test]
    async fn test_producer_error_is_recorded() {
        let pool = WorkerPool::spawn(PoolOptions::default(), |_: usize| async { Ok(()) });
        pool.fail(Error::NotFound("bucket".into()));
        assert!(pool.is_stopped());
        assert!(!pool.submit(1).await);

        let outcome = pool.finish().await;
        assert!(outcome.first_error.unwrap().is_not_found());
    }
}
