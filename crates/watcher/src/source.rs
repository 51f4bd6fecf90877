//! Notification pump
//!
//! Reads raw notification batches from the OS facility, classifies them,
//! resolves watch handles to directories through the registry, and pushes
//! the resulting semantic events into the queue. Malformed notifications
//! (empty mask, missing name) and unclassifiable masks are dropped here;
//! they never reach the queue.

use crate::classify::classify;
use crate::facility::{RawNotification, WatchFacility};
use crate::queue::EventSender;
use crate::registry::WatchRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tagsd_core::FileEvent;
use tracing::{debug, info, trace, warn};

/// Producer task: facility → classifier → queue.
pub struct NotificationPump {
    facility: Arc<dyn WatchFacility>,
    registry: Arc<WatchRegistry>,
    events: EventSender,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl NotificationPump {
    pub fn new(
        facility: Arc<dyn WatchFacility>,
        registry: Arc<WatchRegistry>,
        events: EventSender,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            facility,
            registry,
            events,
            shutdown,
            poll_interval,
        }
    }

    /// Loop until shutdown, pushing classified events into the queue.
    pub fn run(self) {
        info!("notification pump running");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let batch = match self.facility.read() {
                Ok(batch) => batch,
                Err(err) => {
                    warn!("notification read failed: {err}");
                    std::thread::sleep(self.poll_interval);
                    continue;
                }
            };

            if batch.is_empty() {
                std::thread::sleep(self.poll_interval);
                continue;
            }

            for raw in batch {
                if let Some(event) = self.convert(raw) {
                    if !self.events.push(event) && self.shutdown.load(Ordering::SeqCst) {
                        return;
                    }
                }
            }
        }
        info!("notification pump stopped");
    }

    /// Turn one raw notification into a semantic event, or drop it.
    fn convert(&self, raw: RawNotification) -> Option<FileEvent> {
        if raw.mask.is_empty() {
            trace!("dropping notification with empty mask");
            return None;
        }

        // Self-events (and anything else without an entry name) carry no
        // actionable path.
        let name = match raw.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                trace!("dropping notification without entry name");
                return None;
            }
        };

        let op = match classify(raw.mask) {
            Some(op) => op,
            None => {
                trace!(mask = ?raw.mask, "dropping unclassifiable notification");
                return None;
            }
        };

        let Some(dir) = self.registry.path_for(raw.handle) else {
            // Stale handle: the watch was logically removed before this
            // notification was drained. The registry is authoritative.
            debug!(handle = ?raw.handle, "dropping notification for unregistered watch");
            return None;
        };

        Some(FileEvent::new(op, dir.join(name)))
    }
}
