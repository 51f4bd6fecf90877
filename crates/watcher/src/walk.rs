//! Pre-order directory traversal
//!
//! Used for the baseline scan at startup and for re-scans under newly
//! created subtrees. A directory is visited before its children, so a
//! watch exists before the files inside it are reported. Unreadable
//! subtrees are logged and skipped; their siblings are still traversed.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use walkdir::WalkDir;

/// Walk `root` depth-first in pre-order, invoking `on_dir` for every
/// directory (the root included) and `on_file` for every regular file.
///
/// Symlinks are not followed, so link cycles cannot recurse. The walk
/// stops early when `shutdown` is set.
pub fn walk_tree<D, F>(root: &Path, shutdown: &AtomicBool, mut on_dir: D, mut on_file: F)
where
    D: FnMut(&Path),
    F: FnMut(&Path),
{
    for entry in WalkDir::new(root).follow_links(false) {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable subtree: {err}");
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            on_dir(entry.path());
        } else if file_type.is_file() {
            on_file(entry.path());
        }
    }
}
