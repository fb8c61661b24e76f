//! Decoder configuration.
//!
//! Options are plain data and can be loaded from JSON, e.g.
//!
//! ```json
//! {
//!     "string_length_bits": 9,
//!     "max_string_length": 512,
//!     "strict_utf8": false,
//!     "decode_log_level": "trace"
//! }
//! ```
//!
//! Any field left out takes its default.

use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::PropertyError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeOptions {
    /// Width of the length prefix of an encoded string.
    pub string_length_bits: u32,
    /// Longest string, in bytes, the decoder accepts.
    pub max_string_length: usize,
    /// Reject strings that are not valid UTF-8 instead of replacing the invalid sequences.
    pub strict_utf8: bool,
    /// Level for the per-property decode messages, applied by `DefaultUnpacker::with_options`.
    /// `None` leaves the current setting alone.
    pub decode_log_level: Option<LevelFilter>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            string_length_bits: 9,
            max_string_length: 512,
            strict_utf8: true,
            decode_log_level: None,
        }
    }
}

impl DecodeOptions {
    pub fn from_json_str(json: &str) -> Result<Self, PropertyError> {
        let options: DecodeOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PropertyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), PropertyError> {
        if self.string_length_bits == 0 || self.string_length_bits > 32 {
            return Err(PropertyError::InvalidBitCount(self.string_length_bits));
        }
        Ok(())
    }
}
