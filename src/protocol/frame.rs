//! Frame struct and frame encoding.
//!
//! Represents a complete STOMP frame: command, ordered headers and an
//! optional text body. Encoding writes the exact wire layout:
//!
//! ```text
//! COMMAND\n
//! key:value\n      (once per header, in the order given)
//! \n
//! [body]
//! \0
//! ```
//!
//! # Example
//!
//! ```
//! use stomp_codec::protocol::Frame;
//!
//! let frame = Frame::new("SEND")
//!     .with_header("destination", "/queue/a")
//!     .with_body("hello");
//!
//! assert_eq!(frame.encode(), b"SEND\ndestination:/queue/a\n\nhello\x00");
//! ```

use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};

use super::wire_format::{commands, COLON, HEARTBEAT, LF, NUL};
use super::Headers;

/// A complete STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Command token, e.g. `CONNECTED` or `MESSAGE`.
    pub command: String,
    /// Headers in wire order.
    pub headers: Headers,
    /// Body text; `None` when the frame carried no body bytes.
    pub body: Option<String>,
}

impl Frame {
    /// Create a frame with no headers and no body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Add a header (builder style).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Set the body (builder style).
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Get a header value by name.
    #[inline]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    #[inline]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Check if this is a `CONNECTED` frame.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.command == commands::CONNECTED
    }

    /// Check if this is a `MESSAGE` frame.
    #[inline]
    pub fn is_message(&self) -> bool {
        self.command == commands::MESSAGE
    }

    /// Check if this is a `RECEIPT` frame.
    #[inline]
    pub fn is_receipt(&self) -> bool {
        self.command == commands::RECEIPT
    }

    /// Check if this is an `ERROR` frame.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.command == commands::ERROR
    }

    /// Encode this frame to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        build_frame(&self.command, self.headers.iter(), self.body())
    }

    /// Exact size of the encoded frame in bytes.
    pub fn encoded_len(&self) -> usize {
        let headers: usize = self.headers.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
        self.command.len() + 1 + headers + 1 + self.body.as_ref().map_or(0, String::len) + 1
    }
}

/// Build a complete frame as a single byte vector.
///
/// Headers are written in iteration order. No escaping is applied: keys must
/// not contain `:`, and neither keys nor values may contain newlines.
///
/// # Example
///
/// ```
/// use stomp_codec::protocol::build_frame;
///
/// let bytes = build_frame("HI", [("from", "1"), ("to", "2")], None);
/// assert_eq!(bytes, b"HI\nfrom:1\nto:2\n\n\x00");
/// ```
pub fn build_frame<I, K, V>(command: &str, headers: I, body: Option<&str>) -> Vec<u8>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut buf = Vec::with_capacity(command.len() + body.map_or(0, str::len) + 64);
    encode_frame_into(&mut buf, command, headers, body);
    buf
}

/// Encode a frame into an existing buffer.
///
/// Useful for writers that batch several frames into one write.
pub fn encode_frame_into<B, I, K, V>(dst: &mut B, command: &str, headers: I, body: Option<&str>)
where
    B: BufMut,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    dst.put_slice(command.as_bytes());
    dst.put_u8(LF);
    for (key, value) in headers {
        dst.put_slice(key.as_ref().as_bytes());
        dst.put_u8(COLON);
        dst.put_slice(value.as_ref().as_bytes());
        dst.put_u8(LF);
    }
    dst.put_u8(LF);
    if let Some(body) = body {
        dst.put_slice(body.as_bytes());
    }
    dst.put_u8(NUL);
}

/// Bytes for a single outgoing heartbeat.
#[inline]
pub fn encode_heartbeat() -> Bytes {
    Bytes::from_static(HEARTBEAT)
}
