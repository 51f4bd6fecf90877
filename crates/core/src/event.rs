//! Semantic file events emitted by the watch pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Normalized meaning of a raw filesystem notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileOp {
    /// A regular file appeared (created, moved in, or found by a scan)
    Add,
    /// A regular file disappeared (deleted or moved out)
    Del,
    /// A regular file's content changed
    Mod,
    /// A directory appeared
    Mkdir,
    /// A directory disappeared
    Rmdir,
}

impl std::fmt::Display for FileOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOp::Add => write!(f, "ADD"),
            FileOp::Del => write!(f, "DEL"),
            FileOp::Mod => write!(f, "MOD"),
            FileOp::Mkdir => write!(f, "MKDIR"),
            FileOp::Rmdir => write!(f, "RMDIR"),
        }
    }
}

/// File event delivered to the downstream sink, in dequeue order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// Type of change
    pub op: FileOp,
    /// Absolute path of the affected file or directory
    pub path: PathBuf,
}

impl FileEvent {
    /// Create a new event
    pub fn new(op: FileOp, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
        }
    }

    /// Synthetic ADD for a file found by a directory scan
    pub fn add(path: impl Into<PathBuf>) -> Self {
        Self::new(FileOp::Add, path)
    }

    /// Whether this event mutates the watch set when consumed
    pub fn affects_watches(&self) -> bool {
        matches!(self.op, FileOp::Mkdir | FileOp::Rmdir)
    }
}

impl std::fmt::Display for FileEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.op, self.path.display())
    }
}
