//! Shared types for the tagsd watch pipeline
//!
//! This crate provides:
//! - Semantic file events (ADD/DEL/MOD/MKDIR/RMDIR)
//! - Server configuration
//! - The watch error taxonomy

pub mod config;
pub mod error;
pub mod event;

// Re-exports
pub use config::{Config, OverflowPolicy};
pub use error::WatchError;
pub use event::{FileEvent, FileOp};
