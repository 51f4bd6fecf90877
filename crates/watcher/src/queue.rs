//! Bounded FIFO event queue
//!
//! Multi-producer, single-consumer channel between the scan/notification
//! producers and the watch maintainer. Enqueue order is dequeue order;
//! the consumer relies on this to observe a MKDIR before the ADDs for
//! files inside the new subtree.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use tagsd_core::{FileEvent, OverflowPolicy};
use tracing::warn;

/// Create a bounded queue. Senders are cheap to clone; the single
/// receiver belongs to the maintainer.
pub fn event_queue(capacity: usize, policy: OverflowPolicy) -> (EventSender, EventReceiver) {
    let (tx, rx) = bounded(capacity);
    (EventSender { tx, policy }, EventReceiver { rx })
}

/// Producer half of the event queue.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<FileEvent>,
    policy: OverflowPolicy,
}

impl EventSender {
    /// Push an event. Under [`OverflowPolicy::Block`] this waits for
    /// queue space; under [`OverflowPolicy::DropNewest`] a full queue
    /// drops the event with a warning.
    ///
    /// Returns `false` when the event was not enqueued (dropped, or the
    /// consumer is gone).
    pub fn push(&self, event: FileEvent) -> bool {
        match self.policy {
            OverflowPolicy::Block => self.tx.send(event).is_ok(),
            OverflowPolicy::DropNewest => match self.tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(event)) => {
                    warn!("event queue full, dropping {event}");
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        }
    }
}

/// Consumer half of the event queue.
pub struct EventReceiver {
    rx: Receiver<FileEvent>,
}

impl EventReceiver {
    /// Pop the next event, waiting up to `timeout`. Returns `None` on
    /// timeout or when every producer is gone; callers distinguish the
    /// two with their shutdown flag.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<FileEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
