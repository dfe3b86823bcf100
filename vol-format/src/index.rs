//! Frame directory of a sequence file
//!
//! Each frame in a sequence is stored as:
//! ```text
//! u32  frame_number    must equal the frame's position
//! u32  mesh_data_size
//! u8   keyframe        0 = tracked, 1 = keyframe, 2 = last tracked frame (v12+)
//! ..   payload         corrected payload size bytes
//! u32  mesh_data_size  repeated
//! ```
//! Before version 12, `mesh_data_size` excludes some of the payload's size
//! words; [`corrected_payload_size`] restores them.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::header::StreamHeader;

/// Size of the per-frame record header (frame number, size, keyframe byte)
pub const FRAME_HEADER_SIZE: u64 = 9;

/// Size of the trailing size word after each payload
pub const FRAME_TRAILER_SIZE: u64 = 4;

/// Frames at or above this size are treated as a corrupt sequence
pub const MAX_FRAME_SIZE: u64 = 1024 * 1024 * 1024;

/// Keyframe byte of a frame record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum KeyframeKind {
    /// Positions (and normals) only; topology carried forward
    Tracked = 0,
    /// Full frame with indices and UVs
    Keyframe = 1,
    /// Last tracked frame before the next keyframe; carries topology (v12+)
    LastTracked = 2,
}

impl KeyframeKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Tracked),
            1 => Some(Self::Keyframe),
            2 => Some(Self::LastTracked),
            _ => None,
        }
    }

    pub fn is_keyframe(self) -> bool {
        self != Self::Tracked
    }

    /// Whether a frame of this kind stores indices and UVs for the given version
    pub fn carries_topology(self, version: u32) -> bool {
        match self {
            Self::Keyframe => true,
            Self::LastTracked => version >= 12,
            Self::Tracked => false,
        }
    }
}

/// Payload size of a frame, restoring size words older versions leave out of `mesh_data_size`.
pub fn corrected_payload_size(header: &StreamHeader, mesh_data_size: u32, kind: KeyframeKind) -> u64 {
    let mut size = mesh_data_size as u64;
    if header.version < 12 {
        if kind == KeyframeKind::Keyframe {
            // indices and UVs size words
            size += 8;
        }
        if header.version == 11 {
            // normals size word
            size += 4;
            if header.has_texture() {
                size += 4;
            }
        }
    }
    size
}

/// Inverse of [`corrected_payload_size`], used when writing sequences.
pub fn mesh_data_size_for(header: &StreamHeader, payload_size: u64, kind: KeyframeKind) -> u64 {
    let overhead = corrected_payload_size(header, 0, kind);
    payload_size.saturating_sub(overhead)
}

/// One directory entry per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameIndexEntry {
    pub frame_index: u32,
    pub is_keyframe: bool,
    pub kind: KeyframeKind,
    /// Offset of the frame record within the sequence source
    pub byte_offset: u64,
    /// Length of the whole record, header and trailer included
    pub byte_length: u64,
    /// Size stored in the record header
    pub mesh_data_size: u32,
}

impl FrameIndexEntry {
    /// Offset of the payload within the sequence source
    pub fn payload_offset(&self) -> u64 {
        self.byte_offset + FRAME_HEADER_SIZE
    }

    pub fn payload_length(&self) -> u64 {
        self.byte_length - FRAME_HEADER_SIZE - FRAME_TRAILER_SIZE
    }
}

/// Ordered frame directory with a keyframe lookup table.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    entries: Vec<FrameIndexEntry>,
    /// Sorted indices of every keyframe
    keyframes: Vec<u32>,
    largest_frame: u64,
}

impl FrameIndex {
    /// Build the directory by walking every frame record of a sequence.
    ///
    /// `base` is where the first record starts and `source_len` the total
    /// length of the source, both in bytes.
    pub fn scan<R: Read + Seek>(
        reader: &mut R,
        header: &StreamHeader,
        base: u64,
        source_len: u64,
    ) -> Result<Self> {
        let mut index = Self::default();
        index.entries.reserve(header.frame_count as usize);
        reader.seek(SeekFrom::Start(base))?;
        let mut offset = base;

        for i in 0..header.frame_count {
            let frame_number = reader
                .read_u32::<LittleEndian>()
                .map_err(|e| scan_error(i, "frame_number", e))?;
            if frame_number != i {
                return Err(Error::OpenFailed(format!(
                    "frame_number was {} at frame {}",
                    frame_number, i
                )));
            }
            let mesh_data_size = reader
                .read_u32::<LittleEndian>()
                .map_err(|e| scan_error(i, "mesh_data_size", e))?;
            if mesh_data_size as u64 > source_len {
                return Err(Error::OpenFailed(format!(
                    "frame {} has mesh_data_size {}, sequence is {} bytes",
                    i, mesh_data_size, source_len
                )));
            }
            let raw_kind = reader
                .read_u8()
                .map_err(|e| scan_error(i, "keyframe", e))?;
            let kind = KeyframeKind::from_u8(raw_kind).ok_or_else(|| {
                Error::OpenFailed(format!("frame {} has unknown keyframe type {}", i, raw_kind))
            })?;

            let payload = corrected_payload_size(header, mesh_data_size, kind);
            if payload > source_len {
                return Err(Error::OpenFailed(format!(
                    "frame {} payload of {} bytes is too large for a sequence of {} bytes",
                    i, payload, source_len
                )));
            }

            let byte_length = FRAME_HEADER_SIZE + payload + FRAME_TRAILER_SIZE;
            if offset + byte_length > source_len {
                return Err(Error::OpenFailed(format!(
                    "sequence is too short to contain frame {}",
                    i
                )));
            }
            reader.seek(SeekFrom::Current((payload + FRAME_TRAILER_SIZE) as i64))?;

            index.push(FrameIndexEntry {
                frame_index: i,
                is_keyframe: kind.is_keyframe(),
                kind,
                byte_offset: offset,
                byte_length,
                mesh_data_size,
            });
            offset += byte_length;
        }

        if index.largest_frame >= MAX_FRAME_SIZE {
            return Err(Error::OpenFailed(format!(
                "frame size of {} bytes reported, assuming a corrupt sequence",
                index.largest_frame
            )));
        }
        if header.frame_count > 0 && !index.is_keyframe(0) {
            return Err(Error::OpenFailed("frame 0 is not a keyframe".into()));
        }

        log::debug!(
            "Indexed {} frames ({} keyframes), largest frame {} bytes",
            index.len(),
            index.keyframes.len(),
            index.largest_frame
        );
        Ok(index)
    }

    /// Build an index from entries already in frame order.
    pub fn from_entries(entries: impl IntoIterator<Item = FrameIndexEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.push(entry);
        }
        index
    }

    fn push(&mut self, entry: FrameIndexEntry) {
        debug_assert_eq!(entry.frame_index as usize, self.entries.len());
        if entry.is_keyframe {
            self.keyframes.push(entry.frame_index);
        }
        self.largest_frame = self.largest_frame.max(entry.byte_length);
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, frame: u32) -> Option<&FrameIndexEntry> {
        self.entries.get(frame as usize)
    }

    pub fn entries(&self) -> &[FrameIndexEntry] {
        &self.entries
    }

    pub fn is_keyframe(&self, frame: u32) -> bool {
        self.get(frame).is_some_and(|e| e.is_keyframe)
    }

    /// Indices of every keyframe, ascending
    pub fn keyframes(&self) -> &[u32] {
        &self.keyframes
    }

    /// Nearest keyframe at or before `frame`.
    pub fn nearest_keyframe(&self, frame: u32) -> Option<u32> {
        let pos = self.keyframes.partition_point(|&k| k <= frame);
        pos.checked_sub(1).map(|p| self.keyframes[p])
    }

    /// Size of the largest frame record in bytes
    pub fn largest_frame(&self) -> u64 {
        self.largest_frame
    }
}

fn scan_error(frame: u32, field: &str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::OpenFailed(format!(
            "{} at frame {} is out of the sequence file's range",
            field, frame
        ))
    } else {
        Error::Io(e)
    }
}
