//! Volplay Core - vologram playback engine
//!
//! This crate schedules playback of vols geometry streams: it turns elapsed
//! time into frame indices and decodes exactly the frames needed to show them.
//!
//! # Architecture
//!
//! - [`resolver`] - Which frames to decode to reach a target (keyframe first when needed)
//! - [`Player`] - Open/Play/Pause/Step/SkipTo state machine driven by [`Player::tick`]
//! - [`VideoSource`] - Companion color video kept in lock-step with geometry
//! - [`RenderSink`] - Host side receiver for meshes and color frames
//! - [`config`] - Playback settings stored as TOML

pub mod config;
pub mod error;
pub mod player;
pub mod resolver;
pub mod sink;
pub mod sync;
pub mod video;

// Re-export core traits and types
pub use config::{Config, PlayerConfig};
pub use error::PlayerError;
pub use player::{
    PlaybackState, PlaybackStatus, Player, StepOutcome, TickOutcome, VologramSource,
};
pub use resolver::{resolve, DecodePlan, ResolveError};
pub use sink::{LatestFrameSink, NullSink, RenderSink};
pub use sync::DriftMonitor;
pub use video::{FrameBuffer, RawVideoSource, VideoError, VideoSource};
