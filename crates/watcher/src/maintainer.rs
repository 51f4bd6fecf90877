//! Watch maintainer, the single consumer
//!
//! Drains the event queue, forwards every event to the downstream sink in
//! dequeue order, and applies watch-affecting events back onto the
//! registry: MKDIR registers the new directory and re-scans it (a whole
//! tree can be moved in atomically, so files and nested directories may
//! already exist underneath); RMDIR unregisters the directory and every
//! registered descendant. ADDs discovered by a re-scan are delivered by
//! this consumer directly, so they always follow their MKDIR.

use crate::queue::EventReceiver;
use crate::registry::WatchRegistry;
use crate::sink::EventSink;
use crate::walk::walk_tree;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tagsd_core::{Config, FileEvent, FileOp, WatchError};
use tracing::{debug, info, warn};

/// How long one queue pop waits before re-checking the shutdown flag.
const DRAIN_TICK: Duration = Duration::from_millis(100);

/// Sole consumer of the event queue.
pub struct WatchMaintainer {
    registry: Arc<WatchRegistry>,
    events: EventReceiver,
    sink: Arc<dyn EventSink>,
    shutdown: Arc<AtomicBool>,
    config: Config,
}

impl WatchMaintainer {
    pub fn new(
        registry: Arc<WatchRegistry>,
        events: EventReceiver,
        sink: Arc<dyn EventSink>,
        shutdown: Arc<AtomicBool>,
        config: Config,
    ) -> Self {
        Self {
            registry,
            events,
            sink,
            shutdown,
            config,
        }
    }

    /// Drain events until shutdown.
    pub fn run(self) {
        info!("watch maintainer running");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let Some(event) = self.events.pop_timeout(DRAIN_TICK) else {
                continue;
            };
            self.handle(&event);
        }
        info!("watch maintainer stopped");
    }

    /// Apply one event and forward it downstream exactly once.
    fn handle(&self, event: &FileEvent) {
        match event.op {
            FileOp::Mkdir => {
                match self.registry.add(&event.path) {
                    Ok(_) => {
                        self.sink.deliver(event);
                        // Pick up files already present under the new
                        // directory and watch its nested subdirectories.
                        self.rescan(&event.path);
                        return;
                    }
                    Err(err) => {
                        // Forwarded anyway: downstream still learns the
                        // directory appeared, even if it vanished before
                        // we could watch it.
                        warn!("{err}");
                    }
                }
            }
            FileOp::Rmdir => match self.registry.remove_subtree(&event.path) {
                Ok(removed) if removed.len() > 1 => {
                    debug!(
                        "unwatched {} directories under {}",
                        removed.len(),
                        event.path.display()
                    );
                }
                Ok(_) => {}
                Err(WatchError::WatchNotFound(_)) => {
                    // Second removal of the same path, or a directory we
                    // never managed to watch. Idempotent; not fatal.
                    debug!("remove for unwatched directory {}", event.path.display());
                }
                Err(err) => warn!("{err}"),
            },
            FileOp::Add | FileOp::Del | FileOp::Mod => {}
        }

        self.sink.deliver(event);
    }

    /// Walk a newly created subtree: watch every directory, deliver a
    /// synthetic ADD for every file passing the extension filter.
    fn rescan(&self, dir: &Path) {
        walk_tree(
            dir,
            &self.shutdown,
            |d| {
                if let Err(err) = self.registry.add(d) {
                    warn!("{err}");
                }
            },
            |f| {
                if self.config.matches_filter(f) {
                    self.sink.deliver(&FileEvent::add(f));
                }
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::mock::MockFacility;
    use crate::queue::{event_queue, EventSender};
    use crate::sink::MemorySink;
    use std::fs;
    use std::path::PathBuf;
    use tagsd_core::OverflowPolicy;
    use tempfile::TempDir;

    struct Fixture {
        registry: Arc<WatchRegistry>,
        sink: Arc<MemorySink>,
        tx: EventSender,
        shutdown: Arc<AtomicBool>,
        thread: std::thread::JoinHandle<()>,
    }

    fn start(config: Config) -> Fixture {
        let facility = Arc::new(MockFacility::new());
        let registry = Arc::new(WatchRegistry::new(facility));
        let sink = Arc::new(MemorySink::new());
        let (tx, rx) = event_queue(64, OverflowPolicy::Block);
        let shutdown = Arc::new(AtomicBool::new(false));

        let maintainer = WatchMaintainer::new(
            registry.clone(),
            rx,
            sink.clone(),
            shutdown.clone(),
            config,
        );
        let thread = std::thread::spawn(move || maintainer.run());

        Fixture {
            registry,
            sink,
            tx,
            shutdown,
            thread,
        }
    }

    impl Fixture {
        fn wait_for_events(&self, count: usize) {
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while self.sink.len() < count {
                assert!(
                    std::time::Instant::now() < deadline,
                    "expected {} events, saw {:?}",
                    count,
                    self.sink.events()
                );
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        fn stop(self) {
            self.shutdown.store(true, Ordering::SeqCst);
            self.thread.join().unwrap();
        }
    }

    #[test]
    fn test_informational_events_are_forwarded_in_order() {
        let f = start(Config::default());

        f.tx.push(FileEvent::add("/proj/a.txt"));
        f.tx.push(FileEvent::new(FileOp::Mod, "/proj/a.txt"));
        f.tx.push(FileEvent::new(FileOp::Del, "/proj/a.txt"));
        f.wait_for_events(3);

        let ops: Vec<FileOp> = f.sink.events().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![FileOp::Add, FileOp::Mod, FileOp::Del]);
        assert!(f.registry.is_empty());
        f.stop();
    }

    #[test]
    fn test_mkdir_watches_and_rescans_existing_content() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        fs::create_dir_all(sub.join("nested")).unwrap();
        fs::write(sub.join("b.txt"), b"b").unwrap();
        fs::write(sub.join("nested/c.txt"), b"c").unwrap();

        let f = start(Config::default());
        f.tx.push(FileEvent::new(FileOp::Mkdir, &sub));
        f.wait_for_events(3);

        let events = f.sink.events();
        assert_eq!(events[0], FileEvent::new(FileOp::Mkdir, &sub));
        let paths: Vec<PathBuf> = events[1..].iter().map(|e| e.path.clone()).collect();
        assert!(paths.contains(&sub.join("b.txt")));
        assert!(paths.contains(&sub.join("nested/c.txt")));
        assert!(events[1..].iter().all(|e| e.op == FileOp::Add));

        // Both the new directory and its nested subdirectory are watched.
        assert!(f.registry.contains(&sub));
        assert!(f.registry.contains(&sub.join("nested")));
        f.stop();
    }

    #[test]
    fn test_mkdir_rescan_respects_extension_filter() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("index.php"), b"<?php").unwrap();
        fs::write(sub.join("notes.txt"), b"notes").unwrap();

        let f = start(Config {
            extensions: Some(vec!["php".to_string()]),
            ..Config::default()
        });
        f.tx.push(FileEvent::new(FileOp::Mkdir, &sub));
        f.wait_for_events(2);
        std::thread::sleep(Duration::from_millis(50));

        let events = f.sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].path, sub.join("index.php"));
        f.stop();
    }

    #[test]
    fn test_mkdir_for_vanished_directory_is_still_forwarded() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("gone");

        let facility = Arc::new(MockFacility::new());
        facility.fail_path(&gone);
        let registry = Arc::new(WatchRegistry::new(facility));
        let sink = Arc::new(MemorySink::new());
        let (tx, rx) = event_queue(64, OverflowPolicy::Block);
        let shutdown = Arc::new(AtomicBool::new(false));
        let maintainer = WatchMaintainer::new(
            registry.clone(),
            rx,
            sink.clone(),
            shutdown.clone(),
            Config::default(),
        );
        let thread = std::thread::spawn(move || maintainer.run());

        tx.push(FileEvent::new(FileOp::Mkdir, &gone));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sink.is_empty() {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(sink.events()[0].op, FileOp::Mkdir);
        assert!(registry.is_empty());

        shutdown.store(true, Ordering::SeqCst);
        thread.join().unwrap();
    }

    #[test]
    fn test_rmdir_purges_subtree_and_is_idempotent() {
        let f = start(Config::default());
        f.registry.add(Path::new("/proj")).unwrap();
        f.registry.add(Path::new("/proj/sub")).unwrap();
        f.registry.add(Path::new("/proj/sub/nested")).unwrap();

        f.tx.push(FileEvent::new(FileOp::Rmdir, "/proj/sub"));
        f.tx.push(FileEvent::new(FileOp::Rmdir, "/proj/sub"));
        f.wait_for_events(2);

        // Forwarded both times, watch set mutated once.
        assert_eq!(f.sink.len(), 2);
        assert!(f.registry.contains(Path::new("/proj")));
        assert!(!f.registry.contains(Path::new("/proj/sub")));
        assert!(!f.registry.contains(Path::new("/proj/sub/nested")));
        f.stop();
    }
}
