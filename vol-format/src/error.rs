//! Error types for reading and decoding vols streams

use std::io;

/// Errors produced while opening, reading or decoding a geometry stream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header or sequence file could not be opened or is structurally invalid
    #[error("failed to open vologram: {0}")]
    OpenFailed(String),

    /// Requested frame is beyond the stream's frame count
    #[error("frame {frame} out of range (stream has {frame_count} frames)")]
    FrameOutOfRange { frame: u32, frame_count: u32 },

    /// Frame metadata is structurally invalid
    #[error("corrupt frame {frame}: {reason}")]
    CorruptFrame { frame: u32, reason: String },

    /// Frame is missing sub-buffers it is required to carry
    #[error("failed to decode frame {frame}: {reason}")]
    DecodeFailed { frame: u32, reason: String },

    /// Reader was used after `close()`
    #[error("stream reader is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn corrupt(frame: u32, reason: impl Into<String>) -> Self {
        Self::CorruptFrame {
            frame,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode_failed(frame: u32, reason: impl Into<String>) -> Self {
        Self::DecodeFailed {
            frame,
            reason: reason.into(),
        }
    }

    /// Whether playback can continue past this error by keeping the stale mesh.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CorruptFrame { .. } | Self::DecodeFailed { .. })
    }
}

/// Result alias for vols operations
pub type Result<T> = std::result::Result<T, Error>;
