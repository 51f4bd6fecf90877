//! Pipeline construction and lifecycle
//!
//! All shared state (facility, registry, queue, shutdown flag) is built
//! here at startup and handed to the worker threads explicitly, with no
//! ambient globals. Three workers run concurrently:
//!
//! 1. the baseline scanner, which seeds the registry and emits synthetic
//!    ADDs for pre-existing files,
//! 2. the notification pump,
//! 3. the watch maintainer.
//!
//! `shutdown` tears everything down: the flag is observed at every
//! blocking point, the threads are joined, and every watch (plus the OS
//! handle) is released.

use crate::facility::{InotifyFacility, WatchFacility};
use crate::maintainer::WatchMaintainer;
use crate::queue::event_queue;
use crate::registry::WatchRegistry;
use crate::sink::EventSink;
use crate::source::NotificationPump;
use crate::walk::walk_tree;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tagsd_core::{Config, FileEvent};
use tracing::{info, warn};

/// A running watch pipeline.
pub struct Pipeline {
    registry: Arc<WatchRegistry>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Pipeline {
    /// Start the pipeline on the real inotify facility.
    pub fn start(config: Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        let facility =
            Arc::new(InotifyFacility::new().context("failed to initialize inotify")?);
        Self::start_with(config, sink, facility)
    }

    /// Start the pipeline on an explicit facility (tests use a mock).
    pub fn start_with(
        config: Config,
        sink: Arc<dyn EventSink>,
        facility: Arc<dyn WatchFacility>,
    ) -> Result<Self> {
        // Startup contract: the root must exist and be a directory.
        let root = config
            .root
            .canonicalize()
            .with_context(|| format!("cannot resolve root {}", config.root.display()))?;
        anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());

        let registry = Arc::new(WatchRegistry::new(facility.clone()));
        let (tx, rx) = event_queue(config.queue_capacity, config.overflow);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(3);

        // Baseline scanner: registry seeding + ADD backlog, then done.
        {
            let registry = registry.clone();
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            let config = Config {
                root: root.clone(),
                ..config.clone()
            };
            workers.push(
                thread::Builder::new()
                    .name("tagsd-scan".into())
                    .spawn(move || {
                        walk_tree(
                            &config.root,
                            &shutdown,
                            |dir| {
                                if let Err(err) = registry.add(dir) {
                                    warn!("{err}");
                                }
                            },
                            |file| {
                                if config.matches_filter(file) {
                                    tx.push(FileEvent::add(file));
                                }
                            },
                        );
                        info!(
                            "baseline scan complete, watching {} directories",
                            registry.len()
                        );
                    })
                    .context("failed to spawn scanner thread")?,
            );
        }

        // Notification pump.
        {
            let pump = NotificationPump::new(
                facility,
                registry.clone(),
                tx,
                shutdown.clone(),
                config.poll_interval,
            );
            workers.push(
                thread::Builder::new()
                    .name("tagsd-notify".into())
                    .spawn(move || pump.run())
                    .context("failed to spawn pump thread")?,
            );
        }

        // Watch maintainer, the sole consumer.
        {
            let config = Config {
                root: root.clone(),
                ..config
            };
            let maintainer =
                WatchMaintainer::new(registry.clone(), rx, sink, shutdown.clone(), config);
            workers.push(
                thread::Builder::new()
                    .name("tagsd-maintain".into())
                    .spawn(move || maintainer.run())
                    .context("failed to spawn maintainer thread")?,
            );
        }

        info!("watch pipeline started on {}", root.display());
        Ok(Self {
            registry,
            shutdown,
            workers,
        })
    }

    /// The shared watch registry.
    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Whether a directory is currently watched.
    pub fn is_watching(&self, path: &Path) -> bool {
        self.registry.contains(path)
    }

    /// Tear the pipeline down: signal every worker, join them, and
    /// release all watches.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("a pipeline worker panicked during shutdown");
            }
        }
        self.registry.unwatch_all();
        info!("watch pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::mock::MockFacility;
    use crate::sink::MemorySink;
    use inotify::EventMask;
    use std::fs;
    use std::time::Duration;
    use tagsd_core::FileOp;
    use tempfile::TempDir;

    fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !check() {
            assert!(std::time::Instant::now() < deadline, "timed out: {what}");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn test_config(root: &Path) -> Config {
        Config {
            root: root.to_path_buf(),
            poll_interval: Duration::from_millis(5),
            ..Config::default()
        }
    }

    #[test]
    fn test_missing_root_fails_startup() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp.path().join("missing"));
        let result = Pipeline::start_with(
            config,
            Arc::new(MemorySink::new()),
            Arc::new(MockFacility::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_scenario_baseline_mkdir_rescan_rmdir() {
        // A project with a.txt, then sub/ with b.txt appears, then sub/
        // is removed again.
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().canonicalize().unwrap();
        fs::write(proj.join("a.txt"), b"a").unwrap();

        let facility = Arc::new(MockFacility::new());
        let sink = Arc::new(MemorySink::new());
        let pipeline =
            Pipeline::start_with(test_config(&proj), sink.clone(), facility.clone()).unwrap();

        // Baseline: ADD for the pre-existing file, root watched.
        wait_until("baseline ADD", || {
            sink.events()
                .iter()
                .any(|e| e.op == FileOp::Add && e.path == proj.join("a.txt"))
        });
        wait_until("root watched", || pipeline.is_watching(&proj));

        // External creation of sub/ with a file already inside.
        let sub = proj.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.txt"), b"b").unwrap();
        let root_handle = facility.handle_for(&proj).unwrap();
        facility.queue_notification(
            root_handle,
            EventMask::CREATE | EventMask::ISDIR,
            Some("sub"),
        );

        wait_until("MKDIR then rescan ADD", || {
            let events = sink.events();
            let mkdir = events
                .iter()
                .position(|e| e.op == FileOp::Mkdir && e.path == sub);
            let add = events
                .iter()
                .position(|e| e.op == FileOp::Add && e.path == sub.join("b.txt"));
            matches!((mkdir, add), (Some(m), Some(a)) if m < a)
        });
        assert!(pipeline.is_watching(&sub));

        // External deletion of sub/.
        fs::remove_dir_all(&sub).unwrap();
        facility.queue_notification(
            root_handle,
            EventMask::DELETE | EventMask::ISDIR,
            Some("sub"),
        );

        wait_until("RMDIR", || {
            sink.events()
                .iter()
                .any(|e| e.op == FileOp::Rmdir && e.path == sub)
        });
        wait_until("sub unwatched", || !pipeline.is_watching(&sub));
        assert!(pipeline.is_watching(&proj));

        pipeline.shutdown();
    }

    #[test]
    fn test_shutdown_releases_every_watch() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().canonicalize().unwrap();
        fs::create_dir(proj.join("sub")).unwrap();

        let facility = Arc::new(MockFacility::new());
        let sink = Arc::new(MemorySink::new());
        let pipeline =
            Pipeline::start_with(test_config(&proj), sink, facility.clone()).unwrap();

        wait_until("both dirs watched", || pipeline.registry().len() == 2);
        pipeline.shutdown();
        assert_eq!(facility.watched_count(), 0);
    }

    #[test]
    fn test_live_file_events_flow_through() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().canonicalize().unwrap();

        let facility = Arc::new(MockFacility::new());
        let sink = Arc::new(MemorySink::new());
        let pipeline =
            Pipeline::start_with(test_config(&proj), sink.clone(), facility.clone()).unwrap();
        wait_until("root watched", || pipeline.is_watching(&proj));

        let handle = facility.handle_for(&proj).unwrap();
        facility.queue_notification(handle, EventMask::CREATE, Some("a.txt"));
        facility.queue_notification(handle, EventMask::MODIFY, Some("a.txt"));
        facility.queue_notification(handle, EventMask::DELETE, Some("a.txt"));

        wait_until("ADD/MOD/DEL delivered in order", || {
            let ops: Vec<FileOp> = sink
                .events()
                .iter()
                .filter(|e| e.path == proj.join("a.txt"))
                .map(|e| e.op)
                .collect();
            ops == vec![FileOp::Add, FileOp::Mod, FileOp::Del]
        });

        pipeline.shutdown();
    }
}
