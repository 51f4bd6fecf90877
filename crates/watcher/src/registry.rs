//! Bidirectional mapping between watched directories and watch handles
//!
//! The registry is the single source of truth for what is currently
//! monitored. Both map directions are updated under one write lock, so a
//! path is either fully watched or not watched at all; readers never see
//! a half-state. The in-memory mapping is authoritative: OS-level
//! deregistration is attempted but its failure never leaves the maps
//! inconsistent.

use crate::facility::{WatchFacility, WatchHandle};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagsd_core::WatchError;
use tracing::debug;

#[derive(Default)]
struct Maps {
    by_path: HashMap<PathBuf, WatchHandle>,
    by_handle: HashMap<WatchHandle, PathBuf>,
}

/// Bijection between paths and watch handles over the OS watch facility.
pub struct WatchRegistry {
    facility: Arc<dyn WatchFacility>,
    inner: RwLock<Maps>,
}

impl WatchRegistry {
    /// Create an empty registry on top of a facility.
    pub fn new(facility: Arc<dyn WatchFacility>) -> Self {
        Self {
            facility,
            inner: RwLock::new(Maps::default()),
        }
    }

    /// Register a watch for a directory.
    ///
    /// Idempotent: adding an already-watched path returns its existing
    /// handle. Fails with [`WatchError::WatchCreation`] when the OS
    /// refuses the path (e.g. removed between enumeration and this call);
    /// callers skip the path and continue.
    pub fn add(&self, path: &Path) -> Result<WatchHandle, WatchError> {
        if let Some(&handle) = self.inner.read().by_path.get(path) {
            return Ok(handle);
        }

        let handle = self
            .facility
            .add_watch(path)
            .map_err(|source| WatchError::WatchCreation {
                path: path.to_path_buf(),
                source,
            })?;

        let mut inner = self.inner.write();
        inner.by_path.insert(path.to_path_buf(), handle);
        inner.by_handle.insert(handle, path.to_path_buf());
        Ok(handle)
    }

    /// Remove the watch for an exact path.
    ///
    /// Fails with [`WatchError::WatchNotFound`] if the path is not
    /// registered. OS-level deregistration is best-effort; the in-memory
    /// removal is authoritative either way.
    pub fn remove(&self, path: &Path) -> Result<(), WatchError> {
        let handle = {
            let mut inner = self.inner.write();
            let Some(handle) = inner.by_path.remove(path) else {
                return Err(WatchError::WatchNotFound(path.to_path_buf()));
            };
            inner.by_handle.remove(&handle);
            handle
        };

        if !self.facility.remove_watch(handle) {
            debug!(path = %path.display(), "OS watch removal failed, in-memory mapping already purged");
        }
        Ok(())
    }

    /// Remove the watch for a directory and every registered descendant.
    ///
    /// Returns the purged paths. Fails with [`WatchError::WatchNotFound`]
    /// when the directory itself was not registered; descendants, if any
    /// were left behind, are still purged.
    pub fn remove_subtree(&self, path: &Path) -> Result<Vec<PathBuf>, WatchError> {
        let (root_found, removed, handles) = {
            let mut inner = self.inner.write();
            let doomed: Vec<PathBuf> = inner
                .by_path
                .keys()
                .filter(|p| p.starts_with(path))
                .cloned()
                .collect();

            let mut handles = Vec::with_capacity(doomed.len());
            for p in &doomed {
                if let Some(handle) = inner.by_path.remove(p) {
                    inner.by_handle.remove(&handle);
                    handles.push(handle);
                }
            }
            (doomed.iter().any(|p| p == path), doomed, handles)
        };

        for handle in handles {
            self.facility.remove_watch(handle);
        }

        if !root_found {
            return Err(WatchError::WatchNotFound(path.to_path_buf()));
        }
        Ok(removed)
    }

    /// Directory watched under this handle, if any.
    pub fn path_for(&self, handle: WatchHandle) -> Option<PathBuf> {
        self.inner.read().by_handle.get(&handle).cloned()
    }

    /// Handle registered for this path, if any.
    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.inner.read().by_path.get(path).copied()
    }

    /// Whether the exact path is currently watched.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.read().by_path.contains_key(path)
    }

    /// Currently watched paths, in no particular order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner.read().by_path.keys().cloned().collect()
    }

    /// Number of watched directories.
    pub fn len(&self) -> usize {
        self.inner.read().by_path.len()
    }

    /// Whether nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_path.is_empty()
    }

    /// Drop every watch, in-memory and (best-effort) at the OS level.
    /// Used during pipeline teardown.
    pub fn unwatch_all(&self) {
        let handles: Vec<WatchHandle> = {
            let mut inner = self.inner.write();
            let handles = inner.by_handle.keys().copied().collect();
            inner.by_path.clear();
            inner.by_handle.clear();
            handles
        };
        for handle in handles {
            self.facility.remove_watch(handle);
        }
    }
}
