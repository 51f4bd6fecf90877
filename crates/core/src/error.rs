//! Watch pipeline error taxonomy
//!
//! Every variant here is recoverable: a watch that cannot be created is
//! skipped, a remove for an unknown path is a no-op. Only startup contract
//! violations (root directory missing) abort the process, and those are
//! reported by the binary, not by this taxonomy.

use std::path::PathBuf;

/// Errors produced by the watch registry and pipeline.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The OS facility refused to watch a path (deleted between
    /// enumeration and the watch call, permission denied, ...).
    #[error("failed to watch {}: {source}", path.display())]
    WatchCreation {
        /// Path the watch was requested for
        path: PathBuf,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// Remove was requested for a path that is not registered.
    #[error("no watch registered for {}", .0.display())]
    WatchNotFound(PathBuf),

    /// IO error outside the watch calls themselves.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
