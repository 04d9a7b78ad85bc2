//! Parallel dispatch
//!
//! Parallelizable leaves are queued on a fixed worker pool. Parallelizable
//! composites get a coordinator thread of their own, since they block
//! while waiting for their children and must not hold a pool worker doing
//! so. Everything else runs inline on the dispatching thread.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use super::pool::WorkerPool;
use super::{Completion, WorkItem, WorkItemDispatcher};
use crate::error::EngineError;

/// Parallel dispatcher backed by a [`WorkerPool`]
pub struct ParallelDispatcher {
    pool: WorkerPool,
    level_of_parallelism: usize,
}

impl ParallelDispatcher {
    /// Create a dispatcher running at most `level_of_parallelism` leaves at once
    pub fn new(level_of_parallelism: usize) -> Result<Self, EngineError> {
        let level_of_parallelism = level_of_parallelism.max(1);
        let pool = WorkerPool::new(level_of_parallelism, "test-worker")?;
        debug!("Parallel dispatcher started with {} workers", level_of_parallelism);
        Ok(Self {
            pool,
            level_of_parallelism,
        })
    }

    /// Worker count used when none is configured
    pub fn default_level() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .max(2)
    }

    pub fn level_of_parallelism(&self) -> usize {
        self.level_of_parallelism
    }

    fn spawn_coordinator(&self, item: WorkItem, completion: Completion) {
        let name = format!("suite:{}", item.test().name());
        let slot = Arc::new(Mutex::new(Some((item, completion))));
        let thread_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new().name(name).spawn(move || {
            let parts = thread_slot.lock().take();
            if let Some((item, completion)) = parts {
                completion.complete(item.execute());
            }
        });

        if let Err(err) = spawned {
            warn!("Failed to spawn coordinator thread, running inline: {}", err);
            let parts = slot.lock().take();
            if let Some((item, completion)) = parts {
                completion.complete(item.execute());
            }
        }
    }
}

impl WorkItemDispatcher for ParallelDispatcher {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn dispatch(&self, item: WorkItem, completion: Completion) {
        if !item.is_parallelizable() {
            completion.complete(item.execute());
            return;
        }

        if item.is_composite() {
            self.spawn_coordinator(item, completion);
            return;
        }

        let job = Box::new(move || completion.complete(item.execute()));
        if let Err(job) = self.pool.execute(job) {
            warn!("Worker pool rejected job, running inline");
            job();
        }
    }
}
