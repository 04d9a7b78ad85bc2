//! Queued listener delivery
//!
//! `QueuingListener` turns listener calls into messages on a channel;
//! `EventPump` drains the channel on its own thread and forwards each event
//! to the target listener in the order it was queued.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::{ListenerEvent, TestListener};
use crate::error::EngineError;
use crate::models::{Test, TestResult};

enum PumpMessage {
    Event(ListenerEvent),
    Shutdown,
}

/// Listener that enqueues events for an [`EventPump`]
#[derive(Clone)]
pub struct QueuingListener {
    tx: Sender<PumpMessage>,
}

impl QueuingListener {
    fn send(&self, event: ListenerEvent) {
        // Events after the pump has shut down are dropped
        let _ = self.tx.send(PumpMessage::Event(event));
    }
}

impl TestListener for QueuingListener {
    fn test_started(&self, test: &Arc<Test>) {
        self.send(ListenerEvent::TestStarted(Arc::clone(test)));
    }

    fn test_finished(&self, result: &TestResult) {
        self.send(ListenerEvent::TestFinished(result.clone()));
    }

    fn benchmark_iteration_started(&self, test: &Arc<Test>, iteration: u32, total: u32) {
        self.send(ListenerEvent::IterationStarted(Arc::clone(test), iteration, total));
    }

    fn benchmark_iteration_finished(&self, test: &Arc<Test>, iteration: u32, total: u32) {
        self.send(ListenerEvent::IterationFinished(Arc::clone(test), iteration, total));
    }
}

/// Thread forwarding queued events to a listener
pub struct EventPump {
    tx: Sender<PumpMessage>,
    handle: Option<JoinHandle<()>>,
}

impl EventPump {
    /// Start pumping into `target`; returns the pump and the listener feeding it
    pub fn start(target: Arc<dyn TestListener>) -> Result<(Self, QueuingListener), EngineError> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("event-pump".to_string())
            .spawn(move || pump(rx, target))?;

        debug!("Event pump started");
        let listener = QueuingListener { tx: tx.clone() };
        Ok((
            Self {
                tx,
                handle: Some(handle),
            },
            listener,
        ))
    }

    /// Deliver every event queued so far, then stop the pump thread
    pub fn dispose(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.tx.send(PumpMessage::Shutdown);
        if handle.join().is_err() {
            warn!("Event pump thread panicked");
        }
        debug!("Event pump stopped");
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn pump(rx: Receiver<PumpMessage>, target: Arc<dyn TestListener>) {
    for message in rx {
        match message {
            PumpMessage::Event(event) => event.dispatch_to(target.as_ref()),
            PumpMessage::Shutdown => break,
        }
    }
}
