//! Bounded worker pool with fail-fast cancellation
//!
//! One producer task feeds a bounded queue (capacity = worker count) and a
//! fixed number of workers drain it. The first worker whose job fails
//! records the error and cancels the pool's token:
//! - the producer stops enqueueing and drops whatever is left
//! - idle workers stop claiming items
//! - jobs already running are not interrupted; they finish and their
//!   results are discarded
//!
//! The pool's token is a child of the caller's token, so cancelling the
//! caller's token stops the pool the same way.

use crate::{ErrorKind, Link, MirrorError};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default number of workers per pool
pub const DEFAULT_WORKERS: usize = 5;

/// A fixed-size set of workers draining a shared bounded queue
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
}

type FirstError = Arc<Mutex<Option<MirrorError>>>;

impl WorkerPool {
    /// Creates a pool; a worker count of zero is raised to one
    pub fn new(name: &'static str, workers: usize) -> Self {
        Self {
            name,
            workers: workers.max(1),
        }
    }

    /// Returns the number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` over every item with at most `workers` jobs in flight
    ///
    /// Each job receives the pool's cancellation token so long-running jobs
    /// can stop between steps once a sibling has failed.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Every item was processed; the number of items
    /// * `Err(MirrorError::WorkItem)` - The first failure, wrapped with its item
    /// * `Err(MirrorError::Cancelled)` - The caller's token was cancelled
    pub async fn run<F, Fut>(
        &self,
        items: Vec<Link>,
        cancel: &CancellationToken,
        job: F,
    ) -> Result<usize, MirrorError>
    where
        F: Fn(Link, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), MirrorError>> + Send + 'static,
    {
        let token = cancel.child_token();
        let total = items.len();
        let (tx, rx) = mpsc::channel::<Link>(self.workers);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let job = Arc::new(job);
        let first_error: FirstError = Arc::new(Mutex::new(None));
        let completed = Arc::new(AtomicUsize::new(0));

        tracing::debug!(
            pool = self.name,
            workers = self.workers,
            items = total,
            "worker pool started"
        );

        let mut tasks = JoinSet::new();

        let producer_token = token.clone();
        let name = self.name;
        tasks.spawn(async move {
            for item in items {
                tokio::select! {
                    biased;
                    _ = producer_token.cancelled() => {
                        tracing::debug!(pool = name, "cancelled, no more items enqueued");
                        break;
                    }
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            // Dropping the sender closes the queue
        });

        for _ in 0..self.workers {
            let rx = Arc::clone(&rx);
            let job = Arc::clone(&job);
            let token = token.clone();
            let first_error = Arc::clone(&first_error);
            let completed = Arc::clone(&completed);

            tasks.spawn(async move {
                loop {
                    let next = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some(item) = next else { break };

                    match job(item.clone(), token.clone()).await {
                        Ok(()) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            // Siblings that merely noticed the cancellation are not the cause
                            let observed_cancel =
                                err.kind() == ErrorKind::Cancellation && token.is_cancelled();
                            if !observed_cancel {
                                record_first(&first_error, MirrorError::for_item(item, err));
                            }
                            token.cancel();
                            break;
                        }
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(join_err) = joined {
                record_first(&first_error, MirrorError::Task(join_err));
                token.cancel();
            }
        }

        let completed = completed.load(Ordering::Relaxed);
        let first = first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(err) = first {
            tracing::debug!(pool = self.name, completed, total, "worker pool failed: {}", err);
            return Err(err);
        }

        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }

        tracing::debug!(pool = self.name, completed, "worker pool finished");
        Ok(completed)
    }
}

fn record_first(slot: &FirstError, err: MirrorError) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(err);
    }
}
