//! Player errors

use crate::video::VideoError;

/// Errors returned by [`Player`](crate::Player) operations.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// `open` was called while a vologram is already open
    #[error("a vologram is already open")]
    AlreadyOpen,

    /// The operation needs an open vologram
    #[error("no vologram is open")]
    NotOpen,

    /// The companion video could not be opened
    #[error("failed to open video texture: {0}")]
    VideoOpenFailed(#[source] VideoError),

    /// No keyframe exists at or before the requested frame
    #[error(transparent)]
    Resolve(#[from] crate::resolver::ResolveError),

    #[error(transparent)]
    Stream(#[from] vol_format::Error),
}

impl PlayerError {
    /// Whether playback can continue past this error with the previous mesh.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
