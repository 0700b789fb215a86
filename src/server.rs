//! TCP acceptor and server bootstrap.
//!
//! The acceptor owns the listening socket and pushes every accepted stream
//! into the hand-off queue. When the queue is full the acceptor blocks in
//! `put`, which stops it from accepting, so the backlog builds up in the
//! kernel's accept queue instead.

use crate::cancel::CancelToken;
use crate::config::ListenerConfig;
use crate::queue::{Cancelled, ConnectionQueue};
use crate::worker::WorkerPool;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Lifecycle of the acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Created,
    Bound,
    Listening,
    Accepting,
    /// Binding failed; the acceptor will never accept.
    Faulted,
}

/// Owner of the listening socket and the accept loop.
pub struct Acceptor {
    port: u16,
    backlog: usize,
    state: AcceptorState,
    listener: Option<TcpListener>,
}

impl Acceptor {
    pub fn new(config: &ListenerConfig) -> Self {
        Acceptor {
            port: config.port,
            backlog: config.backlog,
            state: AcceptorState::Created,
            listener: None,
        }
    }

    pub fn state(&self) -> AcceptorState {
        self.state
    }

    /// Bind `0.0.0.0:port` and start listening with the configured backlog.
    pub fn bind(&mut self) -> io::Result<SocketAddr> {
        match self.try_bind() {
            Ok(addr) => Ok(addr),
            Err(e) => {
                self.state = AcceptorState::Faulted;
                error!(port = self.port, error = %e, "Failed to create server socket");
                Err(e)
            }
        }
    }

    fn try_bind(&mut self) -> io::Result<SocketAddr> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        self.state = AcceptorState::Bound;

        socket.listen(i32::try_from(self.backlog).unwrap_or(i32::MAX))?;
        self.state = AcceptorState::Listening;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, backlog = self.backlog, "Server socket created");

        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Accept connections and hand them to the workers until cancelled.
    pub fn run(&mut self, queue: &ConnectionQueue<TcpStream>, cancel: &CancelToken) {
        let Some(listener) = self.listener.take() else {
            warn!(state = ?self.state, "Acceptor is not listening");
            return;
        };
        self.state = AcceptorState::Accepting;

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    debug!(
                        peer = %peer,
                        queued = queue.len(),
                        "Connection accepted, handing off to workers"
                    );

                    if let Err(Cancelled(stream)) = queue.put(stream, cancel) {
                        // Not redelivered.
                        warn!(peer = %peer, "Hand-off cancelled, dropping connection");
                        drop(stream);
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }

        info!("Acceptor stopped");
    }
}

/// A running acceptor plus its worker pool.
pub struct Server {
    local_addr: Option<SocketAddr>,
    #[cfg_attr(not(test), allow(dead_code))]
    cancel: CancelToken,
    acceptor: JoinHandle<()>,
    workers: WorkerPool,
}

impl Server {
    /// Start the workers and the acceptor thread.
    ///
    /// A bind failure is logged by the acceptor but does not fail this call;
    /// the server then runs without a listening socket and `local_addr`
    /// returns `None`.
    pub fn start(config: ListenerConfig) -> io::Result<Self> {
        let cancel = CancelToken::new();
        let queue = Arc::new(ConnectionQueue::new(config.backlog));
        let queue_capacity = queue.capacity();

        let workers = WorkerPool::start(config.threads, Arc::clone(&queue), cancel.clone())?;

        let (ready_tx, ready_rx) = mpsc::channel();
        let acceptor_cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name("acceptor".to_string())
            .spawn(move || {
                let mut acceptor = Acceptor::new(&config);
                let _ = ready_tx.send(acceptor.bind().ok());
                if acceptor.state() == AcceptorState::Listening {
                    acceptor.run(&queue, &acceptor_cancel);
                }
            });

        let acceptor = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to spawn acceptor");
                cancel.cancel();
                workers.join();
                return Err(e);
            }
        };

        let local_addr = ready_rx.recv().ok().flatten();
        match local_addr {
            Some(addr) => info!(
                addr = %addr,
                queue_capacity,
                threads = workers.len(),
                "Server started"
            ),
            None => error!(
                port = config.port,
                "Server started without a listening socket, no connections will be accepted"
            ),
        }

        Ok(Server {
            local_addr,
            cancel,
            acceptor,
            workers,
        })
    }

    /// Address the acceptor is listening on, if binding succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Cancel the pipeline and wake the acceptor out of `accept`.
    #[cfg(test)]
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(addr) = self.local_addr {
            let _ = TcpStream::connect((Ipv4Addr::LOCALHOST, addr.port()));
        }
    }

    /// Wait for the acceptor and every worker to exit.
    pub fn join(self) {
        if self.acceptor.join().is_err() {
            error!("Acceptor panicked");
        }
        self.workers.join();
    }
}
