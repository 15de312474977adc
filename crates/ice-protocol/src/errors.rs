//! Errors raised while framing envelopes.

use std::io;

use thiserror::Error;

/// Errors surfaced by [`crate::FrameReader`] and [`crate::FrameWriter`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not valid JSON or does not match the envelope schema.
    #[error("malformed frame: {message}")]
    MalformedJson {
        /// Parser diagnostic.
        message: String,
        /// Underlying parser error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The envelope parsed but its fields disagree with each other.
    #[error("invalid envelope: {message}")]
    InvalidStructure {
        /// Description of the inconsistency.
        message: String,
    },

    /// A single frame exceeded the size limit.
    #[error("frame too large: {size} bytes exceeds {max_size} byte limit")]
    FrameTooLarge {
        /// Bytes read before giving up.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// Reading from or writing to the stream failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serializing an outgoing envelope failed.
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CodecError {
    /// Wraps a deserialization failure.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed-frame error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJson {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid-structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates a frame-too-large error.
    #[must_use]
    pub const fn frame_too_large(size: usize, max_size: usize) -> Self {
        Self::FrameTooLarge { size, max_size }
    }

    /// Returns `true` when the error is confined to one frame and the stream
    /// can keep being read.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedJson { .. } | Self::InvalidStructure { .. }
        )
    }
}
