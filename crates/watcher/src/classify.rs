//! Classification of raw change masks into semantic ops
//!
//! Pure function, no IO. Directory-flagged masks take precedence over
//! their file counterparts; a mask matching no rule is dropped, not an
//! error. Attribute-only changes and other unrequested kinds are
//! expected and carry no actionable information.

use inotify::EventMask;
use tagsd_core::FileOp;

/// Map a kernel change mask to a semantic op.
///
/// Returns `None` for masks outside the classification table.
pub fn classify(mask: EventMask) -> Option<FileOp> {
    let is_dir = mask.contains(EventMask::ISDIR);

    if is_dir && mask.intersects(EventMask::CREATE | EventMask::MOVED_TO) {
        return Some(FileOp::Mkdir);
    }
    if is_dir && mask.intersects(EventMask::DELETE | EventMask::MOVED_FROM) {
        return Some(FileOp::Rmdir);
    }
    if mask.contains(EventMask::MODIFY) {
        return Some(FileOp::Mod);
    }
    if mask.intersects(EventMask::MOVED_TO | EventMask::CREATE) {
        return Some(FileOp::Add);
    }
    if mask.intersects(EventMask::MOVED_FROM | EventMask::DELETE) {
        return Some(FileOp::Del);
    }
    None
}
