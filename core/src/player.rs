//! Playback scheduler
//!
//! Converts elapsed time into a target frame index and drives the keyframe
//! resolver, stream reader and decoder to materialize it. The player is
//! single threaded: the host calls [`Player::tick`] once per frame.
//!
//! ```text
//!            open                play
//!  Closed ─────────► Paused ◄──────────► Playing
//!     ▲                 │       pause       │
//!     └─────────────────┴───────────────────┘
//!                     close
//! ```

use std::path::{Path, PathBuf};

use vol_format::{decode, DecodedFrame, FrameIndex, ReadMode, StreamHeader, StreamReader};

use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::resolver::{resolve, DecodePlan};
use crate::sink::RenderSink;
use crate::sync::DriftMonitor;
use crate::video::VideoSource;

/// Frame rate used when nothing else reports one
pub const DEFAULT_FPS: f64 = 30.0;

/// Where a vologram lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VologramSource {
    /// Header file plus sequence file
    Split { header: PathBuf, sequence: PathBuf },
    /// Version 13 header followed by the frame body
    Single(PathBuf),
}

impl VologramSource {
    /// Open a [`StreamReader`] over this vologram.
    pub fn open_reader(&self, mode: ReadMode) -> vol_format::Result<StreamReader> {
        match self {
            Self::Split { header, sequence } => StreamReader::open(header, sequence, mode),
            Self::Single(path) => StreamReader::open_single(path, mode),
        }
    }
}

/// Coarse player state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Closed,
    Paused,
    Playing,
}

/// Per-player timing state. Reset on every open and restart.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub is_open: bool,
    pub is_playing: bool,
    /// Last materialized frame, -1 before the first decode
    pub currently_loaded_frame_index: i64,
    pub accumulated_seconds: f64,
    pub seconds_per_frame: f64,
    pub total_frame_count: u32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_open: false,
            is_playing: false,
            currently_loaded_frame_index: -1,
            accumulated_seconds: 0.0,
            seconds_per_frame: 1.0 / DEFAULT_FPS,
            total_frame_count: 0,
        }
    }
}

impl PlaybackState {
    fn opened(total_frame_count: u32, seconds_per_frame: f64) -> Self {
        Self {
            is_open: true,
            total_frame_count,
            seconds_per_frame,
            ..Self::default()
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        match (self.is_open, self.is_playing) {
            (false, _) => PlaybackStatus::Closed,
            (true, false) => PlaybackStatus::Paused,
            (true, true) => PlaybackStatus::Playing,
        }
    }

    /// Frame the timeline has reached
    pub fn desired_frame_index(&self) -> i64 {
        (self.accumulated_seconds / self.seconds_per_frame).floor() as i64
    }

    pub fn frame_rate(&self) -> f64 {
        1.0 / self.seconds_per_frame
    }
}

/// Seconds per frame for a reported rate, falling back when the rate is unusable.
pub fn seconds_per_frame(reported_fps: f64, fallback_fps: f32) -> f64 {
    if reported_fps.is_finite() && reported_fps > 0.0 {
        1.0 / reported_fps
    } else if fallback_fps.is_finite() && fallback_fps > 0.0 {
        1.0 / fallback_fps as f64
    } else {
        1.0 / DEFAULT_FPS
    }
}

/// What a call to [`Player::tick`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing
    Idle,
    /// Not enough time elapsed for a new frame
    Waiting,
    /// A new frame was materialized
    Advanced(DecodePlan),
    /// Decoding the frame failed; the previous mesh stays on screen
    Stalled { frame: u32 },
    /// Reached the end and restarted
    Looped,
    /// Reached the end and closed
    Finished,
}

/// What a call to [`Player::step`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced(DecodePlan),
    /// Restarted from the beginning; the next step shows frame 0
    Looped,
    /// Already on the last frame and not looping
    AtEnd,
}

/// Vologram player driving a [`RenderSink`].
pub struct Player<S: RenderSink> {
    config: PlayerConfig,
    sink: S,
    video: Option<Box<dyn VideoSource>>,
    video_path: Option<PathBuf>,
    video_open: bool,
    /// Last video frame handed to the sink, -1 before the first
    video_frame: i64,
    source: Option<VologramSource>,
    reader: Option<StreamReader>,
    state: PlaybackState,
    current: Option<DecodedFrame>,
    /// Last decoded keyframe, the carry-forward source for tracked frames
    keyframe: Option<DecodedFrame>,
    drift: DriftMonitor,
    skipping: bool,
}

impl<S: RenderSink> Player<S> {
    pub fn new(config: PlayerConfig, sink: S) -> Self {
        let drift = DriftMonitor::new(config.drift_threshold);
        Self {
            config,
            sink,
            video: None,
            video_path: None,
            video_open: false,
            video_frame: -1,
            source: None,
            reader: None,
            state: PlaybackState::default(),
            current: None,
            keyframe: None,
            drift,
            skipping: false,
        }
    }

    /// Attach a companion video. Takes effect on the next open.
    pub fn set_video(&mut self, video: Box<dyn VideoSource>, path: PathBuf) {
        self.video = Some(video);
        self.video_path = Some(path);
    }

    /// Open a header and sequence file pair.
    pub fn open(&mut self, header_path: &Path, sequence_path: &Path) -> Result<()> {
        self.open_source(VologramSource::Split {
            header: header_path.to_path_buf(),
            sequence: sequence_path.to_path_buf(),
        })
    }

    /// Open a single-file vologram.
    pub fn open_single(&mut self, path: &Path) -> Result<()> {
        self.open_source(VologramSource::Single(path.to_path_buf()))
    }

    /// Open a vologram and leave the player paused before frame 0.
    ///
    /// Frame 0 is decoded once to validate the stream. On any failure the
    /// player stays closed and nothing is left open.
    pub fn open_source(&mut self, source: VologramSource) -> Result<()> {
        if self.state.is_open {
            tracing::warn!("Open rejected: a vologram is already open");
            return Err(PlayerError::AlreadyOpen);
        }

        let mut reader = source.open_reader(self.config.read_mode).map_err(|e| {
            tracing::error!(error = %e, "Failed to open vologram");
            PlayerError::from(e)
        })?;

        if reader.frame_count() == 0 {
            reader.close();
            tracing::error!("Vologram has no frames");
            return Err(vol_format::Error::OpenFailed("vologram has no frames".into()).into());
        }
        if let Err(e) = reader.read_frame(0).and_then(|raw| decode(&raw, None)) {
            tracing::error!(error = %e, "First frame failed to decode");
            reader.close();
            return Err(e.into());
        }
        reader.seek(0)?;

        let mut video_fps = 0.0;
        if let (Some(video), Some(path)) = (self.video.as_mut(), self.video_path.as_ref()) {
            if let Err(e) = video.open(path) {
                tracing::error!(path = %path.display(), error = %e, "Failed to open video texture");
                reader.close();
                return Err(PlayerError::VideoOpenFailed(e));
            }
            video_fps = video.frame_rate();
            self.video_open = true;
        }

        let header_fps = reader.header().fps as f64;
        let fps = if header_fps > 0.0 { header_fps } else { video_fps };
        let spf = seconds_per_frame(fps, self.config.fallback_fps);
        if fps <= 0.0 {
            log::debug!("No frame rate reported, using {} fps", 1.0 / spf);
        }

        self.state = PlaybackState::opened(reader.frame_count(), spf);
        tracing::info!(
            frames = reader.frame_count(),
            keyframes = reader.frame_index().keyframes().len(),
            fps = self.state.frame_rate(),
            "Opened vologram"
        );
        self.reader = Some(reader);
        self.source = Some(source);
        self.current = None;
        self.keyframe = None;
        self.video_frame = -1;
        Ok(())
    }

    /// Start or resume playback. No-op when closed or already playing.
    pub fn play(&mut self) {
        if self.state.is_open && !self.state.is_playing {
            self.state.is_playing = true;
            tracing::debug!("Playing");
        }
    }

    pub fn pause(&mut self) {
        if self.state.is_playing {
            self.state.is_playing = false;
            tracing::debug!("Paused");
        }
    }

    /// Close the vologram and its video. Returns false if nothing was open.
    pub fn close(&mut self) -> bool {
        if !self.state.is_open {
            return false;
        }
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
        if self.video_open {
            if let Some(video) = self.video.as_mut() {
                video.close();
            }
            self.video_open = false;
        }
        self.state = PlaybackState::default();
        self.current = None;
        self.keyframe = None;
        self.source = None;
        self.video_frame = -1;
        tracing::info!("Closed vologram");
        true
    }

    /// Close and re-open the same vologram from frame 0.
    pub fn restart(&mut self) -> Result<()> {
        self.reopen()?;
        if self.config.play_on_start {
            self.play();
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        let source = self.source.clone().ok_or(PlayerError::NotOpen)?;
        self.close();
        self.open_source(source)
    }

    /// Advance the timeline by `delta_seconds` and materialize the frame it reaches.
    ///
    /// Slow ticks jump straight to the timeline-correct frame. Corrupt frames
    /// are logged and skipped without advancing; other errors are returned.
    pub fn tick(&mut self, delta_seconds: f64) -> Result<TickOutcome> {
        if !self.state.is_playing {
            return Ok(TickOutcome::Idle);
        }

        self.state.accumulated_seconds += delta_seconds.max(0.0);
        let desired = self.state.desired_frame_index();
        if desired <= self.state.currently_loaded_frame_index {
            return Ok(TickOutcome::Waiting);
        }

        if desired >= self.state.total_frame_count as i64 {
            if self.config.looping {
                tracing::debug!("End of vologram, looping");
                self.restart()?;
                return Ok(TickOutcome::Looped);
            }
            self.pause();
            self.close();
            return Ok(TickOutcome::Finished);
        }

        let target = desired as u32;
        match self.materialize(target) {
            Ok(plan) => Ok(TickOutcome::Advanced(plan)),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(frame = target, error = %e, "Skipping mesh update");
                Ok(TickOutcome::Stalled { frame: target })
            }
            Err(e) => Err(e),
        }
    }

    /// Jump forward to `frame` and leave the player paused there.
    ///
    /// Returns `None` without doing anything when a skip is already running
    /// or `frame` is not ahead of the loaded frame.
    pub fn skip_to(&mut self, frame: u32) -> Result<Option<DecodePlan>> {
        if self.skipping {
            tracing::debug!(frame, "Skip already in progress");
            return Ok(None);
        }
        if !self.state.is_open {
            return Err(PlayerError::NotOpen);
        }
        if frame as i64 <= self.state.currently_loaded_frame_index {
            tracing::debug!(
                frame,
                loaded = self.state.currently_loaded_frame_index,
                "Ignoring skip to a frame that is not ahead"
            );
            return Ok(None);
        }
        if frame >= self.state.total_frame_count {
            return Err(vol_format::Error::FrameOutOfRange {
                frame,
                frame_count: self.state.total_frame_count,
            }
            .into());
        }

        self.skipping = true;
        self.pause();
        let result = self.materialize(frame);
        self.skipping = false;

        match result {
            Ok(plan) => {
                self.state.accumulated_seconds = frame as f64 * self.state.seconds_per_frame;
                tracing::info!(frame, decoded = ?plan.frames(), "Skipped");
                Ok(Some(plan))
            }
            Err(e) => {
                tracing::error!(frame, error = %e, "Skip failed");
                Err(e)
            }
        }
    }

    /// Materialize the frame after the loaded one, regardless of elapsed time.
    ///
    /// Pauses playback. On the last frame, restarts when looping, which
    /// leaves nothing loaded and resumes only if `play_on_start` is set.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if !self.state.is_open {
            return Err(PlayerError::NotOpen);
        }
        self.pause();

        let next = self.state.currently_loaded_frame_index + 1;
        if next >= self.state.total_frame_count as i64 {
            if !self.config.looping {
                tracing::debug!("Step ignored at end of vologram");
                return Ok(StepOutcome::AtEnd);
            }
            self.restart()?;
            return Ok(StepOutcome::Looped);
        }

        let next = next as u32;
        let plan = self.materialize(next)?;
        self.state.accumulated_seconds = next as f64 * self.state.seconds_per_frame;
        Ok(StepOutcome::Advanced(plan))
    }

    /// Handle a frame-ready report from an external clock (audio or video).
    ///
    /// Skips ahead when the report leads the geometry by more than the
    /// drift threshold, then resumes playback if it was running.
    pub fn on_external_frame(&mut self, reported: u32) -> Result<Option<DecodePlan>> {
        if !self.state.is_open {
            return Ok(None);
        }
        let loaded = self.state.currently_loaded_frame_index;
        let Some(target) = self.drift.check(reported, loaded) else {
            return Ok(None);
        };
        let target = target.min(self.state.total_frame_count.saturating_sub(1));
        tracing::info!(reported, loaded, target, "External clock drifted, resynchronizing");

        let was_playing = self.state.is_playing;
        let plan = self.skip_to(target)?;
        if was_playing {
            self.play();
        }
        Ok(plan)
    }

    /// Resolve, read and decode `target`, then hand it to the sink.
    ///
    /// The loaded index only moves once the target decoded successfully.
    fn materialize(&mut self, target: u32) -> Result<DecodePlan> {
        let reader = self.reader.as_ref().ok_or(PlayerError::NotOpen)?;
        let plan = resolve(
            self.state.currently_loaded_frame_index,
            target,
            reader.frame_index(),
        )?;

        let baseline = match plan.keyframe() {
            Some(keyframe) => Some(self.decode_frame(keyframe, None)?),
            None => self.keyframe.clone(),
        };
        let frame = self.decode_frame(target, baseline.as_ref())?;

        self.sink.upload_mesh(&frame);
        self.keyframe = if frame.is_keyframe() {
            Some(frame.clone())
        } else {
            baseline
        };
        self.current = Some(frame);
        self.state.currently_loaded_frame_index = target as i64;
        self.sync_video(target);

        tracing::debug!(frame = target, decoded = ?plan.frames(), "Materialized frame");
        Ok(plan)
    }

    fn decode_frame(&mut self, frame: u32, carry: Option<&DecodedFrame>) -> Result<DecodedFrame> {
        let reader = self.reader.as_mut().ok_or(PlayerError::NotOpen)?;
        let raw = if reader.next_frame_index() == frame {
            reader.read_next_frame()?
        } else {
            reader.read_frame(frame)?
        };
        Ok(decode(&raw, carry)?)
    }

    /// Read video frames up to `target`, uploading only the last.
    fn sync_video(&mut self, target: u32) {
        if !self.video_open {
            return;
        }
        let Some(video) = self.video.as_mut() else {
            return;
        };

        let target = target as i64;
        let mut latest = None;
        while self.video_frame < target {
            let is_last = self.video_frame + 1 == target;
            match video.read_next_color_frame(self.config.flip_video && is_last) {
                Ok(frame) => {
                    self.video_frame += 1;
                    if is_last {
                        latest = Some(frame);
                    }
                }
                Err(e) => {
                    tracing::warn!(frame = self.video_frame + 1, error = %e, "Failed to read video frame");
                    break;
                }
            }
        }
        if let Some(frame) = latest {
            self.sink.upload_color(&frame);
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Last materialized frame index, -1 if none
    pub fn frame(&self) -> i64 {
        self.state.currently_loaded_frame_index
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn header(&self) -> Option<&StreamHeader> {
        self.reader.as_ref().map(StreamReader::header)
    }

    pub fn frame_index(&self) -> Option<&FrameIndex> {
        self.reader.as_ref().map(StreamReader::frame_index)
    }

    /// Embedded audio of the open vologram, if any
    pub fn audio(&self) -> Option<&[u8]> {
        self.reader.as_ref().and_then(StreamReader::audio)
    }

    /// Last decoded frame
    pub fn current_frame(&self) -> Option<&DecodedFrame> {
        self.current.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
