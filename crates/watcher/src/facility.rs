//! OS watch facility behind a trait
//!
//! The kernel side of the pipeline: adding and removing per-directory
//! watches and reading raw notifications. The trait exists so the rest of
//! the pipeline can be driven by an in-memory mock in tests; the shipped
//! implementation is Linux inotify.

use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask, Watches};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use tracing::warn;

/// Opaque identifier for one watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub i32);

/// Raw notification as delivered by the OS facility.
///
/// `name` is the entry name relative to the watched directory; it is
/// absent for events about the watched directory itself.
#[derive(Debug, Clone)]
pub struct RawNotification {
    /// Watch the notification belongs to
    pub handle: WatchHandle,
    /// Kernel change mask
    pub mask: EventMask,
    /// Entry name within the watched directory
    pub name: Option<OsString>,
}

/// Access to the operating system's watch facility.
///
/// `read` returns whatever notifications are immediately available and an
/// empty batch otherwise, so callers can interleave reads with shutdown
/// checks. Implementations must serialize the underlying read handle;
/// it is not safe for concurrent invocation.
pub trait WatchFacility: Send + Sync {
    /// Register a watch for a directory.
    fn add_watch(&self, path: &Path) -> io::Result<WatchHandle>;

    /// Deregister a watch. Best-effort: returns whether the OS accepted
    /// the removal; callers treat a `false` as non-fatal.
    fn remove_watch(&self, handle: WatchHandle) -> bool;

    /// Read the currently pending notifications, if any.
    fn read(&self) -> io::Result<Vec<RawNotification>>;
}

/// Change kinds registered with the kernel for every watched directory.
fn watch_mask() -> WatchMask {
    WatchMask::MODIFY
        | WatchMask::MOVED_TO
        | WatchMask::MOVED_FROM
        | WatchMask::CREATE
        | WatchMask::DELETE
}

/// Linux inotify implementation of [`WatchFacility`].
///
/// The inotify read handle is guarded by its own mutex, held only for the
/// duration of the read call. Watch descriptors are mapped to stable
/// [`WatchHandle`] ids so the rest of the pipeline never touches
/// descriptor objects directly.
pub struct InotifyFacility {
    reader: Mutex<Inotify>,
    watches: Mutex<Watches>,
    descriptors: Mutex<DescriptorTable>,
}

#[derive(Default)]
struct DescriptorTable {
    next_id: i32,
    by_handle: HashMap<WatchHandle, WatchDescriptor>,
    by_descriptor: HashMap<WatchDescriptor, WatchHandle>,
}

impl InotifyFacility {
    /// Initialize a new inotify instance.
    pub fn new() -> io::Result<Self> {
        let mut inotify = Inotify::init()?;
        let watches = inotify.watches();
        Ok(Self {
            reader: Mutex::new(inotify),
            watches: Mutex::new(watches),
            descriptors: Mutex::new(DescriptorTable::default()),
        })
    }
}

impl WatchFacility for InotifyFacility {
    fn add_watch(&self, path: &Path) -> io::Result<WatchHandle> {
        let wd = self.watches.lock().add(path, watch_mask())?;

        let mut table = self.descriptors.lock();
        // Re-adding a watched path yields the same descriptor; keep the
        // existing handle so the mapping stays a bijection.
        if let Some(&handle) = table.by_descriptor.get(&wd) {
            return Ok(handle);
        }
        table.next_id += 1;
        let handle = WatchHandle(table.next_id);
        table.by_handle.insert(handle, wd.clone());
        table.by_descriptor.insert(wd, handle);
        Ok(handle)
    }

    fn remove_watch(&self, handle: WatchHandle) -> bool {
        let wd = {
            let mut table = self.descriptors.lock();
            let Some(wd) = table.by_handle.remove(&handle) else {
                return false;
            };
            table.by_descriptor.remove(&wd);
            wd
        };
        self.watches.lock().remove(wd).is_ok()
    }

    fn read(&self) -> io::Result<Vec<RawNotification>> {
        let mut reader = self.reader.lock();
        let mut buffer = [0u8; 4096];

        let events = match reader.read_events(&mut buffer) {
            Ok(events) => events,
            // The fd is non-blocking; no pending notifications.
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let table = self.descriptors.lock();
        let mut batch = Vec::new();
        for event in events {
            if event.mask.contains(EventMask::Q_OVERFLOW) {
                warn!("inotify event queue overflowed, notifications were lost");
                continue;
            }
            let Some(&handle) = table.by_descriptor.get(&event.wd) else {
                // Stale descriptor after a logical removal; nothing to
                // attribute the notification to.
                continue;
            };
            batch.push(RawNotification {
                handle,
                mask: event.mask,
                name: event.name.map(|n| n.to_os_string()),
            });
        }
        Ok(batch)
    }
}
