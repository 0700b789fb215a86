//! Per-connection exchange run by the workers.
//!
//! One shot: read whatever the client has already sent, log it, write the
//! fixed greeting and close. There is no request framing, so a request
//! that arrives in several segments is only partially read.

use crate::connection::Connection;
use crate::protocol::Response;
use bytes::BytesMut;
use std::io;
use tracing::{debug, trace};

/// Outcome of a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub bytes_read: usize,
    pub bytes_written: usize,
}

/// Run the exchange on `conn` and close it.
///
/// The connection is dropped before returning on every path, including
/// I/O errors.
pub fn process<C: Connection>(mut conn: C) -> io::Result<Exchange> {
    let peer = conn.peer_addr();
    let result = exchange(&mut conn);
    drop(conn);

    if let Ok(done) = &result {
        trace!(peer = ?peer, bytes_read = done.bytes_read, "Connection closed");
    }
    result
}

fn exchange<C: Connection>(conn: &mut C) -> io::Result<Exchange> {
    debug!("Reading request");
    let available = conn.available()?;
    let mut buffer = BytesMut::zeroed(available);
    let bytes_read = if available > 0 {
        conn.read(&mut buffer)?
    } else {
        0
    };

    for line in String::from_utf8_lossy(&buffer[..bytes_read]).lines() {
        debug!(line, "read");
    }
    debug!(bytes = bytes_read, "Read done");

    debug!("Writing response");
    let response = Response::hello_world_now();
    conn.write_all(&response)?;
    conn.flush()?;
    debug!(bytes = response.len(), "Writing done");

    Ok(Exchange {
        bytes_read,
        bytes_written: response.len(),
    })
}
