//! Wire format constants, text decoding and frame parsing.
//!
//! Implements the STOMP text frame grammar:
//! ```text
//! FRAME   := COMMAND LF *( KEY ":" VALUE LF ) LF [ BODY ] NUL
//! ```
//!
//! A bare LF where a frame would begin is a heartbeat, not a frame.

use std::str::Utf8Error;

use super::{Frame, Headers};
use crate::error::{FramePart, Result, StompError};

/// Frame terminator byte.
pub const NUL: u8 = 0x00;

/// Line terminator. Also the heartbeat byte.
pub const LF: u8 = b'\n';

/// Separates header key from header value.
pub const COLON: u8 = b':';

/// Blank line separating the header block from the body.
pub const BLANK_LINE: &[u8] = b"\n\n";

/// Heartbeat payload sent on an otherwise idle connection.
pub const HEARTBEAT: &[u8] = b"\n";

/// STOMP command names.
pub mod commands {
    // Client frames
    pub const CONNECT: &str = "CONNECT";
    pub const STOMP: &str = "STOMP";
    pub const SEND: &str = "SEND";
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
    pub const ACK: &str = "ACK";
    pub const NACK: &str = "NACK";
    pub const BEGIN: &str = "BEGIN";
    pub const COMMIT: &str = "COMMIT";
    pub const ABORT: &str = "ABORT";
    pub const DISCONNECT: &str = "DISCONNECT";

    // Server frames
    pub const CONNECTED: &str = "CONNECTED";
    pub const MESSAGE: &str = "MESSAGE";
    pub const RECEIPT: &str = "RECEIPT";
    pub const ERROR: &str = "ERROR";

    /// Check if a command is sent by the server.
    #[inline]
    pub fn is_server_command(command: &str) -> bool {
        matches!(command, CONNECTED | MESSAGE | RECEIPT | ERROR)
    }
}

/// Outcome of decoding a byte sequence as UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecode<'a> {
    /// The whole sequence is valid text.
    Complete(&'a str),
    /// Valid so far, but the sequence stops inside a multi-byte character.
    /// More bytes may still complete it.
    Incomplete(Utf8Error),
    /// The sequence can never be valid text.
    Malformed(Utf8Error),
}

impl<'a> TextDecode<'a> {
    /// Number of leading bytes that are known to be valid text.
    pub fn valid_up_to(&self) -> usize {
        match self {
            TextDecode::Complete(s) => s.len(),
            TextDecode::Incomplete(e) | TextDecode::Malformed(e) => e.valid_up_to(),
        }
    }

    /// Check if more bytes could turn this into valid text.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, TextDecode::Incomplete(_))
    }

    /// Treat the sequence as finished: anything short of `Complete` is an error.
    pub fn finish(self, part: FramePart) -> Result<&'a str> {
        match self {
            TextDecode::Complete(s) => Ok(s),
            TextDecode::Incomplete(source) | TextDecode::Malformed(source) => {
                Err(StompError::MalformedText { part, source })
            }
        }
    }
}

/// Decode bytes as UTF-8, telling a truncated tail apart from invalid input.
///
/// # Example
///
/// ```
/// use stomp_codec::protocol::{decode_text, TextDecode};
///
/// assert_eq!(decode_text("ç".as_bytes()), TextDecode::Complete("ç"));
/// assert!(decode_text(b"\xc3").is_incomplete());
/// assert!(matches!(decode_text(b"\xff"), TextDecode::Malformed(_)));
/// ```
pub fn decode_text(bytes: &[u8]) -> TextDecode<'_> {
    match std::str::from_utf8(bytes) {
        Ok(s) => TextDecode::Complete(s),
        // error_len() is None only when the input ends mid-character
        Err(e) if e.error_len().is_none() => TextDecode::Incomplete(e),
        Err(e) => TextDecode::Malformed(e),
    }
}

/// Split raw frame bytes (terminator excluded) into header block and body.
///
/// The split happens once, on the first blank line. Without a blank line the
/// whole input is the header block and the body is empty.
pub fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    match raw.windows(BLANK_LINE.len()).position(|w| w == BLANK_LINE) {
        Some(i) => (&raw[..i], &raw[i + BLANK_LINE.len()..]),
        None => (raw, &raw[raw.len()..]),
    }
}

/// Parse a header block into command and headers.
///
/// Lines without a colon are skipped rather than rejected.
pub fn parse_header_block(block: &[u8]) -> Result<(String, Headers)> {
    let mut lines = block.split(|&b| b == LF);

    let command = decode_text(lines.next().unwrap_or(&[]))
        .finish(FramePart::Command)?
        .to_owned();

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        match line.iter().position(|&b| b == COLON) {
            Some(colon) => {
                let key = decode_text(&line[..colon]).finish(FramePart::Header)?;
                let value = decode_text(&line[colon + 1..]).finish(FramePart::Header)?;
                headers.insert(key, value);
            }
            None => {
                tracing::debug!(
                    "Ignoring header line without colon in {} frame: {:?}",
                    command,
                    String::from_utf8_lossy(line)
                );
            }
        }
    }

    Ok((command, headers))
}

/// Parse one complete frame from its raw bytes (terminator excluded).
///
/// # Example
///
/// ```
/// use stomp_codec::protocol::parse_frame;
///
/// let frame = parse_frame(b"CONNECT\naccept-version:1.0\n\n").unwrap();
/// assert_eq!(frame.command, "CONNECT");
/// assert_eq!(frame.header("accept-version"), Some("1.0"));
/// assert_eq!(frame.body, None);
/// ```
pub fn parse_frame(raw: &[u8]) -> Result<Frame> {
    let (block, body) = split_head_body(raw);
    let (command, headers) = parse_header_block(block)?;

    // The terminator cannot continue a character, so a truncated tail is final.
    let body = if body.is_empty() {
        None
    } else {
        Some(decode_text(body).finish(FramePart::Body)?.to_owned())
    };

    Ok(Frame {
        command,
        headers,
        body,
    })
}
