//! Recursive filesystem-watch pipeline for tagsd
//!
//! This crate turns raw inotify notifications into an ordered stream of
//! semantic file events (ADD/DEL/MOD/MKDIR/RMDIR) and keeps the watch set
//! in sync with the directory tree it describes:
//!
//! - [`registry::WatchRegistry`]: bijection between watched directories
//!   and their watch handles
//! - [`walk`]: pre-order directory traversal used for the baseline scan
//!   and for re-scans under newly created subtrees
//! - [`facility`]: the OS watch facility behind a trait, so the pipeline
//!   can be driven by a mock in tests
//! - [`classify`]: pure mapping from a change mask to a semantic op
//! - [`queue`]: bounded FIFO channel between producers and the single
//!   consumer
//! - [`maintainer::WatchMaintainer`]: the consumer; forwards events
//!   downstream and mutates the watch set on MKDIR/RMDIR
//! - [`pipeline::Pipeline`]: constructs the shared state and owns the
//!   worker threads and shutdown

pub mod classify;
pub mod facility;
pub mod maintainer;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod source;
pub mod walk;

// Re-exports
pub use facility::{InotifyFacility, RawNotification, WatchFacility, WatchHandle};
pub use pipeline::Pipeline;
pub use registry::WatchRegistry;
pub use sink::{ConsoleSink, EventSink, MemorySink};
