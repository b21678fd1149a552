//! # stomp-codec
//!
//! Streaming decoder and encoder for STOMP text frames.
//!
//! This crate is the framing core of a STOMP client. It performs no I/O:
//! the connection layer reads bytes from its transport, feeds them to a
//! [`StreamDecoder`], and writes the bytes produced by [`build_frame`].
//!
//! ## Architecture
//!
//! - **Decoding**: chunks in arbitrary sizes go into
//!   [`StreamDecoder::add_data`]; complete frames come out of
//!   [`StreamDecoder::pop_frames`]. Heartbeats are reported through a
//!   registered handler.
//! - **Encoding**: [`build_frame`] writes command, headers and body in
//!   the exact wire layout.
//!
//! ## Example
//!
//! ```
//! use stomp_codec::{build_frame, StreamDecoder};
//!
//! let bytes = build_frame("SEND", [("destination", "/queue/a")], Some("hi"));
//!
//! let mut decoder = StreamDecoder::new();
//! decoder.on_heartbeat(|| {});
//! for chunk in bytes.chunks(3) {
//!     decoder.add_data(chunk).unwrap();
//! }
//!
//! let frames = decoder.pop_frames();
//! assert_eq!(frames[0].command, "SEND");
//! assert_eq!(frames[0].header("destination"), Some("/queue/a"));
//! assert_eq!(frames[0].body(), Some("hi"));
//! ```

pub mod config;
pub mod error;
pub mod protocol;

pub use config::DecoderConfig;
pub use error::{FramePart, Result, StompError};
pub use protocol::{build_frame, Frame, Headers, StreamDecoder};
