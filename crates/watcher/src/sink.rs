//! Downstream event delivery
//!
//! The pipeline makes no assumption about what consumes the event stream
//! (an indexer, a logger, a test harness), only that delivery happens in
//! dequeue order. [`ConsoleSink`] is the shipped collaborator: one whole
//! line per event, writers serialized so lines never interleave.

use parking_lot::Mutex;
use std::io::Write;
use tagsd_core::FileEvent;
use tracing::warn;

/// Downstream collaborator receiving semantic events in delivery order.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Called exactly once per event, from the
    /// maintainer thread.
    fn deliver(&self, event: &FileEvent);
}

/// Writes `OP /absolute/path` lines to stdout.
pub struct ConsoleSink {
    out: Mutex<std::io::Stdout>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConsoleSink {
    fn deliver(&self, event: &FileEvent) {
        let mut out = self.out.lock();
        if let Err(err) = writeln!(out, "{event}") {
            warn!("failed to write event line: {err}");
        }
    }
}

/// Collects delivered events in memory. Useful for tests and for
/// embedders that want to inspect the stream directly.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<FileEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far, in delivery order.
    pub fn events(&self) -> Vec<FileEvent> {
        self.events.lock().clone()
    }

    /// Number of delivered events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn deliver(&self, event: &FileEvent) {
        self.events.lock().push(event.clone());
    }
}
