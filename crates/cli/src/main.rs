//! tagsd CLI - the tags server

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tagsd_core::{Config, OverflowPolicy};
use tracing::info;
use watcher::{ConsoleSink, Pipeline};

mod server;

/// tagsd - event-sourcing watch daemon for source trees
#[derive(Parser)]
#[command(name = "tagsd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tags server
    Run {
        /// The base directory of source codes
        dir: PathBuf,

        /// Host of the HTTP endpoint
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port of the HTTP endpoint
        #[arg(long, default_value_t = 65000)]
        port: u16,

        /// Event queue capacity
        #[arg(long, default_value_t = 64 * 1024)]
        queue_capacity: usize,

        /// Drop events instead of blocking producers when the queue is full
        #[arg(long)]
        drop_on_full: bool,

        /// Only report files with this extension (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            dir,
            host,
            port,
            queue_capacity,
            drop_on_full,
            extensions,
        } => run(dir, host, port, queue_capacity, drop_on_full, extensions),
    }
}

fn run(
    dir: PathBuf,
    host: String,
    port: u16,
    queue_capacity: usize,
    drop_on_full: bool,
    extensions: Vec<String>,
) -> Result<()> {
    if !dir.is_dir() {
        bail!("<dir> isn't a directory: {}", dir.display());
    }

    let config = Config {
        root: dir,
        host,
        port,
        queue_capacity,
        overflow: if drop_on_full {
            OverflowPolicy::DropNewest
        } else {
            OverflowPolicy::Block
        },
        poll_interval: Duration::from_millis(100),
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };

    let pipeline = Pipeline::start(config.clone(), Arc::new(ConsoleSink::new()))?;
    let (http, http_thread) = server::spawn(&config.bind_address())?;

    wait_for_shutdown_signal()?;
    info!("shutting down");

    http.unblock();
    if http_thread.join().is_err() {
        tracing::warn!("http thread panicked during shutdown");
    }
    pipeline.shutdown();
    Ok(())
}

/// Block until SIGINT or SIGTERM arrives.
fn wait_for_shutdown_signal() -> Result<()> {
    use signal_hook::consts::signal;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([signal::SIGINT, signal::SIGTERM])?;
    signals.forever().next();
    Ok(())
}
