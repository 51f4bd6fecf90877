//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What producers do when the event queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Block the producer until the consumer drains the queue
    Block,
    /// Drop the incoming event and log a warning
    DropNewest,
}

/// Configuration for the tags server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory of the source tree to watch
    pub root: PathBuf,
    /// Host for the HTTP endpoint
    pub host: String,
    /// Port for the HTTP endpoint
    pub port: u16,
    /// Event queue capacity
    pub queue_capacity: usize,
    /// Behavior when the event queue is full
    pub overflow: OverflowPolicy,
    /// How long the notification pump sleeps when no events are pending
    pub poll_interval: Duration,
    /// Only emit synthetic ADD events for files with these extensions.
    /// `None` means every regular file is reported.
    pub extensions: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: "127.0.0.1".to_string(),
            port: 65000,
            queue_capacity: 64 * 1024,
            overflow: OverflowPolicy::Block,
            poll_interval: Duration::from_millis(100),
            extensions: None,
        }
    }
}

impl Config {
    /// Address the HTTP endpoint binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a scanned file passes the extension filter
    pub fn matches_filter(&self, path: &Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}
