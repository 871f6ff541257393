//! Bounded worker pool
//!
//! The build pipeline's "parallel worker pool with a bounded queue"
//! (spec.md §5, §9) expressed the idiomatic async-Rust way: a
//! `tokio::sync::Semaphore` gates how many tasks are in flight at
//! once, and a `tokio::task::JoinSet` collects them, rather than a
//! hand-rolled thread pool. Cooperative cancellation is checked before
//! each task is dispatched; tasks already spawned are allowed to
//! finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(capacity: usize, cancelled: Arc<AtomicBool>) -> Self {
        WorkerPool {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
            cancelled,
        }
    }

    /// Run `f(item)` for every item in `items`, bounded to this pool's
    /// capacity. Returns `None` for items skipped because cancellation
    /// was observed before dispatch, in the same order as `items`.
    pub async fn run_all<T, F, Fut, O>(&self, items: Vec<T>, f: F) -> Vec<Option<O>>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Send + 'static,
    {
        let f = Arc::new(f);
        let mut join_set: JoinSet<(usize, Option<O>)> = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                join_set.spawn(async move { (index, None) });
                continue;
            }

            let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let f = f.clone();
            join_set.spawn(async move {
                let result = f(item).await;
                drop(permit);
                (index, Some(result))
            });
        }

        let mut results: Vec<Option<O>> = Vec::new();
        let mut slots: std::collections::BTreeMap<usize, Option<O>> = std::collections::BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, value) = joined.expect("worker task panicked");
            slots.insert(index, value);
        }
        results.extend(slots.into_values());
        results
    }
}
