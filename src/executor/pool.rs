//! Fixed-size worker pool

use crossbeam_channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::commands::panic_message;
use crate::error::EngineError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Named worker threads draining a shared job queue
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers named `{name}-{n}`
    pub fn new(size: usize, name: &str) -> Result<Self, EngineError> {
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for n in 0..size.max(1) {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{n}"))
                .spawn(move || {
                    for job in rx.iter() {
                        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                            error!("Worker job panicked: {}", panic_message(payload.as_ref()));
                        }
                    }
                })?;
            workers.push(handle);
        }

        debug!("Started {} workers for {}", workers.len(), name);
        Ok(Self {
            tx: Some(tx),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job`; hands it back if the pool no longer accepts work
    pub fn execute(&self, job: Job) -> Result<(), Job> {
        match &self.tx {
            Some(tx) => tx.send(job).map_err(|err| err.into_inner()),
            None => Err(job),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.tx.take();
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // The last handle may be released by a job running on a worker
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }
    }
}
