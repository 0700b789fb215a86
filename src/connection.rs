//! Accepted client connections.
//!
//! Workers only need a byte stream plus a way to ask how many bytes are
//! already waiting, so the exchange is written against this trait instead
//! of `TcpStream` directly.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::AsRawFd;

/// An open bidirectional byte stream handed from the acceptor to a worker.
///
/// Dropping the value closes the connection.
pub trait Connection: Read + Write {
    /// Bytes that can be read right now without blocking.
    fn available(&self) -> io::Result<usize>;

    /// Remote endpoint, used only to identify the connection in logs.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Connection for TcpStream {
    fn available(&self) -> io::Result<usize> {
        let mut pending: libc::c_int = 0;
        // SAFETY: FIONREAD writes a single c_int into `pending` for a valid socket fd.
        let rc = unsafe {
            libc::ioctl(
                self.as_raw_fd(),
                libc::FIONREAD,
                &mut pending as *mut libc::c_int,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(pending.max(0) as usize)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}
