//! Fixed HTTP/1.0 greeting written to every accepted connection.
//!
//! The request is never parsed; every connection gets the same reply:
//!
//! ```text
//! HTTP/1.0 200 OK
//! Content-Type: text/plain
//! Date: 2024-01-31
//! Content-length: 13
//!
//! Hello, World!
//! ```
//!
//! Lines end with the platform line ending rather than CRLF. Clients that
//! insist on strict HTTP framing may reject the reply.

use bytes::BytesMut;
use chrono::{Local, NaiveDate};

/// Status line of the reply
pub const STATUS_LINE: &str = "HTTP/1.0 200 OK";

/// Media type of the body
pub const CONTENT_TYPE: &str = "text/plain";

/// Reply body
pub const BODY: &str = "Hello, World!";

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";

#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Response generator for the greeting
pub struct Response;

impl Response {
    /// Render the greeting dated with today's local date.
    pub fn hello_world_now() -> BytesMut {
        Self::hello_world(Local::now().date_naive())
    }

    /// Render the greeting with an explicit `Date` header value.
    pub fn hello_world(date: NaiveDate) -> BytesMut {
        let mut response = BytesMut::with_capacity(128);

        Self::line(&mut response, STATUS_LINE);
        Self::line(&mut response, &format!("Content-Type: {CONTENT_TYPE}"));
        Self::line(&mut response, &format!("Date: {}", date.format("%Y-%m-%d")));
        Self::line(&mut response, &format!("Content-length: {}", BODY.len()));
        Self::line(&mut response, "");
        Self::line(&mut response, BODY);

        response
    }

    fn line(response: &mut BytesMut, text: &str) {
        response.extend_from_slice(text.as_bytes());
        response.extend_from_slice(LINE_ENDING.as_bytes());
    }
}
