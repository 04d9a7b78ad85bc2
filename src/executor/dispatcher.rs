//! Work item dispatchers
//!
//! A dispatcher decides where a work item runs. Every dispatched item
//! reports its result through the [`Completion`] handed in with it, so the
//! caller collects results the same way whether the item ran inline or on
//! another thread.

use crossbeam_channel::{bounded, Sender};
use std::sync::Arc;
use tracing::debug;

use super::WorkItem;
use crate::error::EngineError;
use crate::models::TestResult;

/// Strategy for running work items
pub trait WorkItemDispatcher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run `item` and report its result through `completion`
    ///
    /// May return before the item has finished.
    fn dispatch(&self, item: WorkItem, completion: Completion);
}

/// Slot a dispatched item reports its result into
pub struct Completion {
    index: usize,
    tx: Sender<(usize, TestResult)>,
}

impl Completion {
    pub fn new(index: usize, tx: Sender<(usize, TestResult)>) -> Self {
        Self { index, tx }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn complete(self, result: TestResult) {
        // The receiver is gone only when the waiting parent was abandoned
        let _ = self.tx.send((self.index, result));
    }
}

/// Dispatch `item` and block until its whole tree has completed
pub fn dispatch_and_wait(
    dispatcher: &Arc<dyn WorkItemDispatcher>,
    item: WorkItem,
) -> Result<TestResult, EngineError> {
    let (tx, rx) = bounded(1);
    debug!(dispatcher = dispatcher.name(), test = item.test().full_name(), "Dispatching");
    dispatcher.dispatch(item, Completion::new(0, tx));
    rx.recv().map(|(_, result)| result).map_err(|_| EngineError::RunLost)
}

/// Runs every item inline on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialDispatcher;

impl SequentialDispatcher {
    pub fn new() -> Self {
        Self
    }
}

impl WorkItemDispatcher for SequentialDispatcher {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn dispatch(&self, item: WorkItem, completion: Completion) {
        completion.complete(item.execute());
    }
}
