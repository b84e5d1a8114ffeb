//! Running the resolution pipeline over a batch of changes.
//!
//! Items are processed on a rayon pool. Progress is reported once per 5%
//! threshold crossing, truncated to the step it landed in.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::errors::ResolveError;

/// Percentage granularity of progress milestones.
pub const PROGRESS_STEP: u32 = 5;

/// Counts completed items and hands out progress milestones.
pub struct ProgressTracker {
    total: usize,
    processed: AtomicUsize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
        }
    }

    /// Record one completed item and return the milestone it crossed, if any.
    ///
    /// Each completion owns a distinct count, so the milestone it lands on
    /// is handed to that caller alone.
    pub fn complete_one(&self) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        let done = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if done > self.total {
            return None;
        }
        let reached = self.milestone_at(done);
        (reached > self.milestone_at(done - 1)).then_some(reached)
    }

    fn milestone_at(&self, done: usize) -> u32 {
        let percent = ((done * 100) / self.total) as u32;
        percent - percent % PROGRESS_STEP
    }
}

/// Fan-out executor for per-change work.
pub struct BatchProcessor {
    pool: ThreadPool,
}

impl BatchProcessor {
    /// Build a processor with `parallelism` workers; `0` uses one per core.
    pub fn new(parallelism: usize) -> Result<Self, ResolveError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("upmerge-resolve-{}", i))
            .build()
            .map_err(|e| ResolveError::WorkerPool(e.to_string()))?;
        debug!(threads = pool.current_num_threads(), "resolution pool ready");
        Ok(Self { pool })
    }

    /// Run `work` on every item in parallel and collect the results in input
    /// order. The first error aborts the batch.
    pub fn process<T, R, E, W, P>(&self, items: &[T], work: W, on_milestone: P) -> Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: Send,
        W: Fn(&T) -> Result<R, E> + Sync,
        P: Fn(u32) + Sync,
    {
        let tracker = ProgressTracker::new(items.len());
        self.pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    let result = work(item);
                    if let Some(milestone) = tracker.complete_one() {
                        on_milestone(milestone);
                    }
                    result
                })
                .collect()
        })
    }

    /// Sequential counterpart of [`process`](Self::process).
    pub fn process_serially<T, R, E, W, P>(items: &[T], work: W, on_milestone: P) -> Result<Vec<R>, E>
    where
        W: Fn(&T) -> Result<R, E>,
        P: Fn(u32),
    {
        let tracker = ProgressTracker::new(items.len());
        items
            .iter()
            .map(|item| {
                let result = work(item);
                if let Some(milestone) = tracker.complete_one() {
                    on_milestone(milestone);
                }
                result
            })
            .collect()
    }
}
