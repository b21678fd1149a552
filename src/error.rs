//! Error types for stomp-codec.

use std::fmt;
use std::str::Utf8Error;

use thiserror::Error;

/// Part of a frame that failed text decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
    /// The command line.
    Command,
    /// A header key or value.
    Header,
    /// The frame body.
    Body,
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePart::Command => f.write_str("command"),
            FramePart::Header => f.write_str("header"),
            FramePart::Body => f.write_str("body"),
        }
    }
}

/// Main error type for all decoder operations.
#[derive(Debug, Error)]
pub enum StompError {
    /// Frame text can never be valid UTF-8, no matter what arrives next.
    #[error("Malformed text in frame {part}: {source}")]
    MalformedText {
        part: FramePart,
        #[source]
        source: Utf8Error,
    },

    /// Partial frame grew beyond the configured limit without a terminator.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Invalid decoder configuration.
    #[error("Invalid config: {0}")]
    Config(String),

    /// JSON deserialization error (config loading).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StompError {
    /// Check if this error came from a malformed frame (as opposed to config).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            StompError::MalformedText { .. } | StompError::FrameTooLarge { .. }
        )
    }
}

/// Result type alias using StompError.
pub type Result<T> = std::result::Result<T, StompError>;
