//! Decoder configuration.
//!
//! The connection layer usually carries these values in its own JSON config,
//! so [`DecoderConfig`] deserializes with serde and every field is optional.
//!
//! ```
//! use stomp_codec::DecoderConfig;
//!
//! let config = DecoderConfig::from_json(r#"{ "max_frame_size": 65536 }"#).unwrap();
//! assert_eq!(config.max_frame_size, 65536);
//! assert_eq!(config.initial_capacity, 8 * 1024);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, StompError};

/// Default maximum size of a single frame (1 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default initial capacity of the pending buffer (8 KB).
pub const DEFAULT_INITIAL_CAPACITY: usize = 8 * 1024;

/// Configuration for [`StreamDecoder`](crate::protocol::StreamDecoder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Maximum bytes one frame may occupy before its terminator.
    pub max_frame_size: usize,
    /// Initial capacity of the pending byte buffer.
    pub initial_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl DecoderConfig {
    /// Parse and validate a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the maximum frame size (builder style).
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the initial buffer capacity (builder style).
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(StompError::Config(
                "max_frame_size must be greater than 0".to_string(),
            ));
        }

        if self.initial_capacity == 0 {
            return Err(StompError::Config(
                "initial_capacity must be greater than 0".to_string(),
            ));
        }

        if self.initial_capacity > self.max_frame_size {
            return Err(StompError::Config(format!(
                "initial_capacity {} exceeds max_frame_size {}",
                self.initial_capacity, self.max_frame_size
            )));
        }

        Ok(())
    }
}
