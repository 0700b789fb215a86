//! In-memory connections for exercising workers without sockets.

use crate::connection::Connection;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Where a [`MockConnection`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Available,
    Read,
    Write,
}

/// Handle kept by the test to inspect a connection after a worker dropped it.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl Probe {
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8(self.written()).unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockConnection {
    input: Cursor<Vec<u8>>,
    fault: Fault,
    probe: Probe,
}

impl MockConnection {
    pub fn new(input: &[u8], fault: Fault) -> (Self, Probe) {
        let probe = Probe::default();
        let conn = Self {
            input: Cursor::new(input.to_vec()),
            fault,
            probe: probe.clone(),
        };
        (conn, probe)
    }
}

fn broken(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, format!("{op} failed"))
}

impl Read for MockConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fault == Fault::Read {
            return Err(broken("read"));
        }
        self.input.read(buf)
    }
}

impl Write for MockConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fault == Fault::Write {
            return Err(broken("write"));
        }
        self.probe.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connection for MockConnection {
    fn available(&self) -> io::Result<usize> {
        if self.fault == Fault::Available {
            return Err(broken("available"));
        }
        Ok(self.input.get_ref().len() - self.input.position() as usize)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}
