//! hello-dispatch: a thread-pool TCP listener
//!
//! One acceptor thread accepts connections and queues them in a bounded
//! hand-off queue. A fixed pool of worker threads takes them off the queue
//! and answers each with a fixed HTTP/1.0 "Hello, World!" reply.
//!
//! Features:
//! - Backpressure from the queue all the way to the kernel accept backlog
//! - Workers that survive any per-connection I/O failure
//! - Configuration via a properties file (packaged default or `--config`)

mod cancel;
mod config;
mod connection;
mod handler;
mod protocol;
mod queue;
mod server;
#[cfg(test)]
mod testing;
mod worker;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        port = config.listener.port,
        backlog = config.listener.backlog,
        threads = config.listener.threads,
        "Starting hello-dispatch"
    );

    let server = Server::start(config.listener)?;
    if let Some(addr) = server.local_addr() {
        info!(addr = %addr, "Serving");
    }
    server.join();

    Ok(())
}
