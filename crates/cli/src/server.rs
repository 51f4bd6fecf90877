//! Placeholder HTTP endpoint
//!
//! Unrelated to the watch pipeline: answers every request with a greeting
//! so deployments can health-check the process. A query API over the tag
//! index would replace this.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Response, Server};
use tracing::{info, warn};

/// Bind the placeholder endpoint and serve it on a background thread.
/// `Server::unblock` stops the loop during shutdown.
pub fn spawn(bind_address: &str) -> Result<(Arc<Server>, thread::JoinHandle<()>)> {
    let server = Arc::new(
        Server::http(bind_address)
            .map_err(|err| anyhow!("failed to bind http endpoint on {bind_address}: {err}"))?,
    );
    info!("http endpoint listening on {bind_address}");

    let handle = {
        let server = server.clone();
        thread::Builder::new()
            .name("tagsd-http".into())
            .spawn(move || serve(&server))?
    };
    Ok((server, handle))
}

fn serve(server: &Server) {
    let served = AtomicU64::new(0);
    for request in server.incoming_requests() {
        let n = served.fetch_add(1, Ordering::Relaxed) + 1;
        let mut response = Response::from_string(format!("<h1>Hello tagsd. #{n}</h1>"));
        if let Ok(header) =
            Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        {
            response = response.with_header(header);
        }
        if let Err(err) = request.respond(response) {
            warn!("failed to respond to http request: {err}");
        }
    }
}
