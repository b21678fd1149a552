//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the STOMP text framing:
//! - Frame and header value types
//! - Frame encoding to the exact wire layout
//! - Stream decoder for accumulating partial reads and heartbeats

mod frame;
mod headers;
mod stream_decoder;
mod wire_format;

pub use frame::{build_frame, encode_frame_into, encode_heartbeat, Frame};
pub use headers::Headers;
pub use stream_decoder::{HeartbeatHandler, StreamDecoder};
pub use wire_format::{
    commands, decode_text, parse_frame, parse_header_block, split_head_body, TextDecode,
    BLANK_LINE, COLON, HEARTBEAT, LF, NUL,
};
