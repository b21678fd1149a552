//! Incremental decoder turning transport chunks into frames.
//!
//! Uses `bytes::BytesMut` for the pending buffer and a small state machine:
//! - `AwaitingFrame`: at a frame boundary, a bare LF here is a heartbeat
//! - `AwaitingTerminator`: command bytes seen, scanning for NUL
//! - `Discarding`: dropping an oversized frame through its NUL
//!
//! Text decoding only happens once a terminator has been found, so a
//! multi-byte character split across chunks is always whole by then.
//!
//! # Example
//!
//! ```
//! use stomp_codec::protocol::StreamDecoder;
//!
//! let mut decoder = StreamDecoder::new();
//!
//! // Data arrives in arbitrary chunks from the socket
//! decoder.add_data(b"MESSAGE\ndestination:/queue/a\n\nhel").unwrap();
//! assert!(decoder.frames_ready().is_empty());
//!
//! decoder.add_data(b"lo\x00\n").unwrap();
//! let frames = decoder.pop_frames();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].body(), Some("hello"));
//! assert_eq!(decoder.heartbeats_received(), 1);
//! ```

use std::collections::VecDeque;
use std::fmt;

use bytes::{Buf, BytesMut};

use super::wire_format::{parse_frame, LF, NUL};
use super::Frame;
use crate::config::DecoderConfig;
use crate::error::{Result, StompError};

/// Callback invoked once per received heartbeat.
pub type HeartbeatHandler = Box<dyn FnMut() + Send>;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At a frame boundary; leading LFs are heartbeats.
    AwaitingFrame,
    /// Inside a frame, waiting for the NUL terminator.
    AwaitingTerminator,
    /// Dropping the rest of an oversized frame up to its NUL terminator.
    Discarding,
}

/// Stateful STOMP decoder for one connection.
///
/// Feed bytes with [`add_data`](Self::add_data) in arrival order and collect
/// finished frames with [`pop_frames`](Self::pop_frames).
pub struct StreamDecoder {
    /// Bytes that do not yet form a complete frame.
    pending: BytesMut,
    /// Prefix of `pending` already searched for a terminator.
    scan_from: usize,
    /// Current parsing state.
    state: State,
    /// Completed frames, oldest first.
    ready: VecDeque<Frame>,
    heartbeats: u64,
    on_heartbeat: Option<HeartbeatHandler>,
    config: DecoderConfig,
}

impl StreamDecoder {
    /// Create a decoder with default settings.
    ///
    /// Default capacity: 8KB, max frame: 1MB.
    pub fn new() -> Self {
        Self::from_valid_config(DecoderConfig::default())
    }

    /// Create a decoder with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration fails [`DecoderConfig::validate`].
    pub fn with_config(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: DecoderConfig) -> Self {
        Self {
            pending: BytesMut::with_capacity(config.initial_capacity),
            scan_from: 0,
            state: State::AwaitingFrame,
            ready: VecDeque::new(),
            heartbeats: 0,
            on_heartbeat: None,
            config,
        }
    }

    /// Register the heartbeat handler, replacing any previous one.
    ///
    /// The handler runs synchronously inside `add_data`, once per heartbeat,
    /// in arrival order relative to the frames around it.
    pub fn on_heartbeat<F>(&mut self, handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_heartbeat = Some(Box::new(handler));
    }

    /// Push a chunk into the decoder and extract every complete frame.
    ///
    /// Completed frames are queued; partial data is kept for the next call.
    /// A bad frame never stops the scan: every good frame and heartbeat in
    /// the buffered bytes is still delivered before this returns.
    ///
    /// # Errors
    ///
    /// Returns the first error seen during this call; later ones are logged.
    ///
    /// - `MalformedText` if a completed frame is not valid UTF-8. That frame
    ///   is dropped.
    /// - `FrameTooLarge` if a frame exceeds the configured maximum. The frame
    ///   is dropped through its terminator, including bytes that have not
    ///   arrived yet.
    pub fn add_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(chunk);

        let mut first_error = None;
        while let Some(result) = self.next_frame() {
            match result {
                Ok(frame) => {
                    tracing::trace!("Decoded {} frame", frame.command);
                    self.ready.push_back(frame);
                }
                Err(e) => {
                    tracing::warn!("Dropping frame: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Advance the state machine until a frame (or a frame error) is
    /// produced. Returns `None` when more bytes are needed.
    fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.state {
                State::Discarding => match self.pending.iter().position(|&b| b == NUL) {
                    Some(end) => {
                        self.pending.advance(end + 1);
                        self.state = State::AwaitingFrame;
                    }
                    None => {
                        self.pending.clear();
                        return None;
                    }
                },
                State::AwaitingFrame => {
                    self.consume_heartbeats();
                    if self.pending.is_empty() {
                        return None;
                    }
                    self.state = State::AwaitingTerminator;
                }
                State::AwaitingTerminator => {
                    let offset = match self.pending[self.scan_from..]
                        .iter()
                        .position(|&b| b == NUL)
                    {
                        Some(offset) => offset,
                        None => {
                            let size = self.pending.len();
                            if size <= self.config.max_frame_size {
                                self.scan_from = size;
                                return None;
                            }
                            // Terminator still to come: drop it with the rest.
                            self.pending.clear();
                            self.scan_from = 0;
                            self.state = State::Discarding;
                            return Some(Err(self.too_large(size)));
                        }
                    };

                    // Consume frame bytes and terminator before decoding, so a
                    // bad frame never leaves residue behind.
                    let end = self.scan_from + offset;
                    let raw = self.pending.split_to(end + 1);
                    self.scan_from = 0;
                    self.state = State::AwaitingFrame;

                    if end > self.config.max_frame_size {
                        return Some(Err(self.too_large(end)));
                    }
                    return Some(parse_frame(&raw[..end]));
                }
            }
        }
    }

    /// Take all completed frames, oldest first.
    pub fn pop_frames(&mut self) -> Vec<Frame> {
        self.ready.drain(..).collect()
    }

    /// Take the oldest completed frame, if any.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.ready.pop_front()
    }

    /// Completed frames without removing them.
    #[inline]
    pub fn frames_ready(&self) -> &VecDeque<Frame> {
        &self.ready
    }

    /// Total heartbeats seen by this decoder.
    #[inline]
    pub fn heartbeats_received(&self) -> u64 {
        self.heartbeats
    }

    /// Number of buffered bytes not yet part of a complete frame.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Check if the decoder sits at a frame boundary with nothing buffered.
    ///
    /// `false` while the tail of an oversized frame is being dropped.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.state != State::Discarding
    }

    /// Configuration this decoder was built with.
    #[inline]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Drop pending bytes and queued frames, and reset state.
    ///
    /// The heartbeat handler and counter are kept.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.ready.clear();
        self.scan_from = 0;
        self.state = State::AwaitingFrame;
    }

    /// Strip LF bytes at the frame boundary, signalling one heartbeat each.
    fn consume_heartbeats(&mut self) {
        let count = self.pending.iter().take_while(|&&b| b == LF).count();
        if count == 0 {
            return;
        }

        self.pending.advance(count);
        for _ in 0..count {
            self.heartbeats += 1;
            tracing::trace!("Received heartbeat");
            if let Some(handler) = self.on_heartbeat.as_mut() {
                handler();
            }
        }
    }

    fn too_large(&self, size: usize) -> StompError {
        StompError::FrameTooLarge {
            size,
            max: self.config.max_frame_size,
        }
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::AwaitingFrame => "AwaitingFrame",
            State::AwaitingTerminator => "AwaitingTerminator",
            State::Discarding => "Discarding",
        }
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("pending_len", &self.pending.len())
            .field("state", &self.state)
            .field("ready", &self.ready.len())
            .field("heartbeats", &self.heartbeats)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FramePart;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counting_decoder() -> (StreamDecoder, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut decoder = StreamDecoder::new();
        let seen = count.clone();
        decoder.on_heartbeat(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (decoder, count)
    }

    #[test]
    fn test_single_packet() {
        let mut decoder = StreamDecoder::new();
        decoder
            .add_data(b"CONNECT\naccept-version:1.0\n\n\x00")
            .unwrap();

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "CONNECT");
        assert_eq!(frames[0].header("accept-version"), Some("1.0"));
        assert_eq!(frames[0].headers.len(), 1);
        assert_eq!(frames[0].body, None);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_partial_packet() {
        let mut decoder = StreamDecoder::new();

        decoder.add_data(b"CONNECT\n").unwrap();
        assert!(decoder.frames_ready().is_empty());
        assert_eq!(decoder.state_name(), "AwaitingTerminator");

        decoder.add_data(b"accept-version:1.0\n\n\x00").unwrap();
        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "CONNECT");
        assert_eq!(frames[0].header("accept-version"), Some("1.0"));
        assert_eq!(decoder.state_name(), "AwaitingFrame");
    }

    #[test]
    fn test_multiple_partial_packets_with_heartbeats() {
        let (mut decoder, heartbeats) = counting_decoder();
        for chunk in [
            &b"CONNECT\n"[..],
            &b"accept-version:1.0\n\n\x00\n"[..],
            &b"CONNECTED\n"[..],
            &b"version:1.0\n\n\x00\n"[..],
        ] {
            decoder.add_data(chunk).unwrap();
        }

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, "CONNECT");
        assert_eq!(frames[1].command, "CONNECTED");
        assert_eq!(frames[1].header("version"), Some("1.0"));
        assert_eq!(heartbeats.load(Ordering::SeqCst), 2);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_terminator_at_chunk_start() {
        let mut decoder = StreamDecoder::new();
        for chunk in [
            &b"CONNECTED\nversion:1.0\n\n"[..],
            &b"\x00\nERROR\n"[..],
            &b"header:1.0\n\n"[..],
            &b"Hey dude\x00\n"[..],
        ] {
            decoder.add_data(chunk).unwrap();
        }

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, "CONNECTED");
        assert_eq!(frames[0].body, None);
        assert_eq!(frames[1].command, "ERROR");
        assert_eq!(frames[1].header("header"), Some("1.0"));
        assert_eq!(frames[1].body.as_deref(), Some("Hey dude"));
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        for chunk in [
            &b"CONNECTED\naccept-version:1.0\n\n"[..],
            &b"\x00\nERROR\n"[..],
            &b"header:1.0\n\n\xc3"[..],
            &b"\xa7\x00\n"[..],
        ] {
            decoder.add_data(chunk).unwrap();
        }

        assert_eq!(decoder.frames_ready().len(), 2);
        assert!(decoder.is_idle());
        assert_eq!(decoder.frames_ready()[0].body, None);
        assert_eq!(decoder.frames_ready()[1].body.as_deref(), Some("ç"));
    }

    #[test]
    fn test_lone_heartbeat() {
        let (mut decoder, heartbeats) = counting_decoder();
        decoder.add_data(b"\n").unwrap();

        assert!(decoder.is_idle());
        assert!(decoder.frames_ready().is_empty());
        assert_eq!(heartbeats.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.heartbeats_received(), 1);
    }

    #[test]
    fn test_heartbeat_after_terminator() {
        let (mut decoder, heartbeats) = counting_decoder();
        decoder
            .add_data(b"CONNECT\naccept-version:1.0\n\n\x00\n")
            .unwrap();

        assert_eq!(heartbeats.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.frames_ready().len(), 1);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_heartbeat_before_frame() {
        let (mut decoder, heartbeats) = counting_decoder();
        decoder
            .add_data(b"\nCONNECT\naccept-version:1.0\n\n\x00")
            .unwrap();

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "CONNECT");
        assert_eq!(frames[0].header("accept-version"), Some("1.0"));
        assert_eq!(frames[0].body, None);
        assert_eq!(heartbeats.load(Ordering::SeqCst), 1);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_newline_inside_frame_is_not_heartbeat() {
        let (mut decoder, heartbeats) = counting_decoder();
        decoder.add_data(b"SEND").unwrap();
        decoder.add_data(b"\n").unwrap();
        decoder.add_data(b"\n").unwrap();
        decoder.add_data(b"\x00").unwrap();

        assert_eq!(heartbeats.load(Ordering::SeqCst), 0);
        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "SEND");
        assert!(frames[0].headers.is_empty());
    }

    #[test]
    fn test_heartbeats_and_frames_in_arrival_order() {
        let events = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let mut decoder = StreamDecoder::new();
        let log = events.clone();
        decoder.on_heartbeat(move || log.lock().unwrap().push("heartbeat"));

        for chunk in [&b"\n"[..], &b"RECEIPT\n\n\x00"[..], &b"\n\n"[..]] {
            decoder.add_data(chunk).unwrap();
            for _ in decoder.pop_frames() {
                events.lock().unwrap().push("frame");
            }
        }

        assert_eq!(
            *events.lock().unwrap(),
            vec!["heartbeat", "frame", "heartbeat", "heartbeat"]
        );
    }

    #[test]
    fn test_pop_frames_drains() {
        let mut decoder = StreamDecoder::new();
        decoder.add_data(b"A\n\n\x00B\n\n\x00C\n\n\x00").unwrap();

        let first = decoder.pop_frames();
        let commands: Vec<&str> = first.iter().map(|f| f.command()).collect();
        assert_eq!(commands, vec!["A", "B", "C"]);

        assert!(decoder.pop_frames().is_empty());
    }

    #[test]
    fn test_pop_frame_single() {
        let mut decoder = StreamDecoder::new();
        decoder.add_data(b"A\n\n\x00B\n\n\x00").unwrap();

        assert_eq!(decoder.pop_frame().map(|f| f.command), Some("A".into()));
        assert_eq!(decoder.frames_ready().len(), 1);
        assert_eq!(decoder.pop_frame().map(|f| f.command), Some("B".into()));
        assert!(decoder.pop_frame().is_none());
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = b"\nMESSAGE\nsubscription:0\n\nsal\xc3\xa7a\x00\n";
        let (mut decoder, heartbeats) = counting_decoder();

        for byte in input {
            decoder.add_data(&[*byte]).unwrap();
        }

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), Some("salça"));
        assert_eq!(heartbeats.load(Ordering::SeqCst), 2);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_scan_resumes_where_it_stopped() {
        let mut decoder = StreamDecoder::new();
        decoder.add_data(b"SEND\n\nabc").unwrap();
        assert_eq!(decoder.scan_from, 9);

        decoder.add_data(b"def").unwrap();
        assert_eq!(decoder.scan_from, 12);

        decoder.add_data(b"\x00").unwrap();
        assert_eq!(decoder.scan_from, 0);
        assert_eq!(decoder.pop_frames()[0].body(), Some("abcdef"));
    }

    #[test]
    fn test_malformed_frame_keeps_earlier_and_later_frames() {
        let mut decoder = StreamDecoder::new();
        let result = decoder.add_data(b"A\n\n\x00BAD\n\n\xff\x00C\n\n\x00");

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            StompError::MalformedText {
                part: FramePart::Body,
                ..
            }
        ));

        // Frames on both sides of the failure are queued in the same call
        let commands: Vec<String> = decoder.pop_frames().into_iter().map(|f| f.command).collect();
        assert_eq!(commands, vec!["A", "C"]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_first_error_is_returned_and_heartbeats_still_fire() {
        let (mut decoder, count) = counting_decoder();
        let err = decoder
            .add_data(b"BAD\n\n\xff\x00\nWORSE\nk:\xfe\n\n\x00\nOK\n\n\x00")
            .unwrap_err();

        // The body error comes first; the header error is only logged
        assert!(matches!(
            err,
            StompError::MalformedText {
                part: FramePart::Body,
                ..
            }
        ));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(decoder.pop_frames().len(), 1);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_truncated_character_before_terminator_is_malformed() {
        let mut decoder = StreamDecoder::new();
        decoder.add_data(b"SEND\n\n\xc3").unwrap();
        assert!(decoder.frames_ready().is_empty());

        let err = decoder.add_data(b"\x00").unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_frame_too_large_without_terminator() {
        let config = DecoderConfig::default().max_frame_size(16).initial_capacity(16);
        let mut decoder = StreamDecoder::with_config(config).unwrap();

        decoder.add_data(b"SEND\n\n0123456789").unwrap();
        let err = decoder.add_data(b"abc").unwrap_err();

        assert!(matches!(err, StompError::FrameTooLarge { size: 19, max: 16 }));
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.state_name(), "Discarding");
        assert!(!decoder.is_idle());
    }

    #[test]
    fn test_oversized_tail_is_not_parsed_as_a_frame() {
        let config = DecoderConfig::default().max_frame_size(16).initial_capacity(16);
        let mut decoder = StreamDecoder::with_config(config).unwrap();

        decoder.add_data(b"SEND\n\n0123456789").unwrap();
        assert!(decoder.add_data(b"abc").is_err());

        // Rest of the dropped frame, then a real one
        decoder.add_data(b"def\x00").unwrap();
        assert!(decoder.frames_ready().is_empty());
        assert!(decoder.is_idle());

        decoder.add_data(b"ACK\n\n\x00").unwrap();
        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "ACK");
    }

    #[test]
    fn test_discarding_spans_chunks_and_keeps_heartbeats_after() {
        let (mut decoder, count) = counting_decoder();
        decoder.config = DecoderConfig::default().max_frame_size(4).initial_capacity(4);

        assert!(decoder.add_data(b"SEND\n\nxx").is_err());
        decoder.add_data(b"more body").unwrap();
        decoder.add_data(b"still more").unwrap();
        assert_eq!(decoder.pending_len(), 0);

        decoder.add_data(b"end\x00\n\nA\n\n\x00").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(decoder.pop_frames().len(), 1);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_frame_too_large_in_single_chunk() {
        let config = DecoderConfig::default().max_frame_size(8).initial_capacity(8);
        let mut decoder = StreamDecoder::with_config(config).unwrap();

        let err = decoder
            .add_data(b"SEND\n\n0123456789\x00ACK\n\n\x00")
            .unwrap_err();
        assert!(matches!(err, StompError::FrameTooLarge { size: 16, max: 8 }));

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "ACK");
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_with_config_rejects_invalid_config() {
        let err = StreamDecoder::with_config(DecoderConfig::default().max_frame_size(0)).unwrap_err();
        assert!(matches!(err, StompError::Config(_)));

        let err = StreamDecoder::with_config(
            DecoderConfig::default().max_frame_size(16).initial_capacity(32),
        )
        .unwrap_err();
        assert!(matches!(err, StompError::Config(_)));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut decoder = StreamDecoder::new();
        decoder.add_data(b"A\n\n\x00\nSEN").unwrap();

        assert_eq!(decoder.state_name(), "AwaitingTerminator");
        assert_eq!(decoder.frames_ready().len(), 1);
        assert_eq!(decoder.pending_len(), 3);

        decoder.clear();

        assert_eq!(decoder.state_name(), "AwaitingFrame");
        assert!(decoder.is_idle());
        assert!(decoder.frames_ready().is_empty());
        assert_eq!(decoder.heartbeats_received(), 1);
    }

    #[test]
    fn test_bare_terminator_yields_empty_command() {
        let mut decoder = StreamDecoder::new();
        decoder.add_data(b"\x00").unwrap();

        let frames = decoder.pop_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "");
        assert!(frames[0].headers.is_empty());
        assert_eq!(frames[0].body, None);
    }

    #[test]
    fn test_decoders_are_independent() {
        let mut first = StreamDecoder::new();
        let mut second = StreamDecoder::new();

        first.add_data(b"SEND\n\nfirst").unwrap();
        second.add_data(b"SEND\n\nsecond\x00").unwrap();

        assert!(first.frames_ready().is_empty());
        assert_eq!(second.pop_frames()[0].body(), Some("second"));
    }

    #[test]
    fn test_decoder_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<StreamDecoder>();
    }
}
