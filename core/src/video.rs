//! Companion video collaborator
//!
//! The player pulls one color frame per geometry frame from a
//! [`VideoSource`]. Pixel decoding lives outside this crate; the bundled
//! [`RawVideoSource`] reads pre-decoded RGB24 frames packed back to back.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Errors from a video source
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("failed to open video {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid video dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("video is not open")]
    NotOpen,

    #[error("end of video reached")]
    EndOfStream,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One decoded color frame, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel
    pub channels: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Mirror the image vertically in place.
    pub fn flip_vertical(&mut self) {
        let row = self.row_bytes();
        let rows = self.height as usize;
        if row == 0 || self.data.len() < row * rows {
            return;
        }
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (upper, lower) = self.data.split_at_mut(bottom * row);
            upper[top * row..(top + 1) * row].swap_with_slice(&mut lower[..row]);
        }
    }
}

/// Source of color frames kept in lock-step with geometry.
pub trait VideoSource {
    fn open(&mut self, path: &Path) -> Result<(), VideoError>;

    /// Read the next frame, optionally flipped vertically.
    fn read_next_color_frame(&mut self, flip_vertically: bool) -> Result<FrameBuffer, VideoError>;

    fn frame_size_bytes(&self) -> u64;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Frames per second, `0.0` if unknown
    fn frame_rate(&self) -> f64;

    fn frame_count(&self) -> u64;

    /// Duration in seconds
    fn duration(&self) -> f64 {
        let rate = self.frame_rate();
        if rate > 0.0 {
            self.frame_count() as f64 / rate
        } else {
            0.0
        }
    }

    /// Close the video. Returns false if nothing was open.
    fn close(&mut self) -> bool;
}

/// Reads raw RGB24 frames from a headerless file.
///
/// Dimensions and rate are supplied up front since the file carries none.
#[derive(Debug)]
pub struct RawVideoSource {
    width: u32,
    height: u32,
    frame_rate: f64,
    file: Option<BufReader<File>>,
    frame_count: u64,
    frames_read: u64,
}

impl RawVideoSource {
    pub const CHANNELS: u32 = 3;

    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
            file: None,
            frame_count: 0,
            frames_read: 0,
        }
    }

    /// Frames handed out since open
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl VideoSource for RawVideoSource {
    fn open(&mut self, path: &Path) -> Result<(), VideoError> {
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let file = File::open(path).map_err(|source| VideoError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file.metadata()?.len();
        self.frame_count = len / self.frame_size_bytes();
        self.frames_read = 0;
        self.file = Some(BufReader::new(file));
        log::debug!(
            "Opened raw video {} ({}x{}, {} frames)",
            path.display(),
            self.width,
            self.height,
            self.frame_count
        );
        Ok(())
    }

    fn read_next_color_frame(&mut self, flip_vertically: bool) -> Result<FrameBuffer, VideoError> {
        let size = self.frame_size_bytes() as usize;
        let file = self.file.as_mut().ok_or(VideoError::NotOpen)?;
        if self.frames_read >= self.frame_count {
            return Err(VideoError::EndOfStream);
        }
        let mut data = vec![0u8; size];
        file.read_exact(&mut data)?;
        self.frames_read += 1;

        let mut frame = FrameBuffer::new(self.width, self.height, Self::CHANNELS, data);
        if flip_vertically {
            frame.flip_vertical();
        }
        Ok(frame)
    }

    fn frame_size_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * Self::CHANNELS as u64
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn close(&mut self) -> bool {
        self.frames_read = 0;
        self.file.take().is_some()
    }
}
