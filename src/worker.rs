//! Fixed-size pool of worker threads draining the hand-off queue.
//!
//! Every worker runs the same loop: take a connection, run the exchange,
//! repeat. A failed exchange is logged and the worker moves on; a bad
//! client never takes a worker down. Workers only exit once the pool's
//! cancel token fires.

use crate::cancel::CancelToken;
use crate::connection::Connection;
use crate::handler::{process, Exchange};
use crate::queue::{Cancelled, ConnectionQueue};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace};

/// Handles to the running worker threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers, each named `worker-{id}`.
    pub fn start<C>(
        threads: usize,
        queue: Arc<ConnectionQueue<C>>,
        cancel: CancelToken,
    ) -> io::Result<Self>
    where
        C: Connection + Send + 'static,
    {
        let mut handles = Vec::with_capacity(threads);

        for worker_id in 0..threads {
            let queue = Arc::clone(&queue);
            let worker_cancel = cancel.clone();

            let spawned = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &queue, &worker_cancel));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = worker_id, error = %e, "Failed to spawn worker");
                    release(handles, &cancel);
                    return Err(e);
                }
            }
        }

        info!(workers = threads, "Worker pool started");
        Ok(WorkerPool { handles })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                error!("Worker panicked");
            }
        }
    }
}

/// Stop and join workers that started before a later spawn failed.
fn release(handles: Vec<JoinHandle<()>>, cancel: &CancelToken) {
    cancel.cancel();
    WorkerPool { handles }.join();
}

/// Body of a single worker thread.
pub fn worker_loop<C: Connection>(
    worker_id: usize,
    queue: &ConnectionQueue<C>,
    cancel: &CancelToken,
) {
    debug!(worker = worker_id, "Worker started");

    loop {
        let conn = match queue.take(cancel) {
            Ok(conn) => conn,
            Err(Cancelled(())) => break,
        };
        debug!(worker = worker_id, "Connection taken from queue");

        match process(conn) {
            Ok(Exchange {
                bytes_read,
                bytes_written,
            }) => {
                trace!(worker = worker_id, bytes_read, bytes_written, "Exchange done");
            }
            Err(e) => {
                debug!(worker = worker_id, error = %e, "Exchange failed");
            }
        }
    }

    debug!(worker = worker_id, "Worker stopped");
}
