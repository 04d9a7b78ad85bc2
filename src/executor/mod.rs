//! Test execution
//!
//! Work items, the dispatchers that schedule them, and the runner that
//! ties a loaded tree to a run.

mod dispatcher;
mod parallel;
mod pool;
mod runner;
mod work_item;

pub use dispatcher::{dispatch_and_wait, Completion, SequentialDispatcher, WorkItemDispatcher};
pub use parallel::ParallelDispatcher;
pub use pool::{Job, WorkerPool};
pub use runner::{RunHandle, TestRunner};
pub use work_item::{WorkItem, WorkItemState};
