//! Sequence writer
//!
//! Produces header and sequence files in the same layout the reader
//! consumes. Used to build fixtures and sample volograms.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::header::{StreamHeader, V13_HEADER_SIZE};
use crate::index::{mesh_data_size_for, KeyframeKind};
use crate::{HEADER_FILE_NAME, SEQUENCE_FILE_NAME};

/// In-memory description of one frame to write
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuilder {
    pub kind: KeyframeKind,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u16>,
    pub uvs: Vec<[f32; 2]>,
    pub texture: Vec<u8>,
}

impl FrameBuilder {
    /// A keyframe with full topology
    pub fn keyframe(positions: Vec<[f32; 3]>, indices: Vec<u16>, uvs: Vec<[f32; 2]>) -> Self {
        Self {
            kind: KeyframeKind::Keyframe,
            positions,
            normals: Vec::new(),
            indices,
            uvs,
            texture: Vec::new(),
        }
    }

    /// A tracked frame that only moves vertices
    pub fn tracked(positions: Vec<[f32; 3]>) -> Self {
        Self {
            kind: KeyframeKind::Tracked,
            positions,
            normals: Vec::new(),
            indices: Vec::new(),
            uvs: Vec::new(),
            texture: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: KeyframeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_texture(mut self, texture: Vec<u8>) -> Self {
        self.texture = texture;
        self
    }
}

/// Writer for frame records
pub struct SequenceWriter<W: Write> {
    writer: W,
    header: StreamHeader,
    frames_written: u32,
}

impl<W: Write> SequenceWriter<W> {
    /// Create a writer for frames described by `header`
    pub fn new(writer: W, header: StreamHeader) -> Self {
        Self {
            writer,
            header,
            frames_written: 0,
        }
    }

    /// Write the next frame record
    pub fn write_frame(&mut self, frame: &FrameBuilder) -> io::Result<()> {
        let payload = self.encode_payload(frame);
        let mesh_data_size = mesh_data_size_for(&self.header, payload.len() as u64, frame.kind);
        let mesh_data_size = u32::try_from(mesh_data_size)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

        self.writer.write_u32::<LittleEndian>(self.frames_written)?;
        self.writer.write_u32::<LittleEndian>(mesh_data_size)?;
        self.writer.write_u8(frame.kind as u8)?;
        self.writer.write_all(&payload)?;
        self.writer.write_u32::<LittleEndian>(mesh_data_size)?;

        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn encode_payload(&self, frame: &FrameBuilder) -> Vec<u8> {
        let version = self.header.version;
        let mut payload = Vec::new();
        write_section(&mut payload, bytemuck::cast_slice(&frame.positions));
        if self.header.has_normals() && version >= 11 {
            write_section(&mut payload, bytemuck::cast_slice(&frame.normals));
        }
        if frame.kind.carries_topology(version) {
            write_section(&mut payload, bytemuck::cast_slice(&frame.indices));
            write_section(&mut payload, bytemuck::cast_slice(&frame.uvs));
        }
        if self.header.has_texture() && version >= 11 {
            write_section(&mut payload, &frame.texture);
        }
        payload
    }
}

fn write_section(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Write the audio chunk that follows a version 13 header
fn write_audio_chunk<W: Write>(writer: &mut W, audio: Option<&[u8]>) -> io::Result<()> {
    let audio = audio.unwrap_or(&[]);
    writer.write_u32::<LittleEndian>(audio.len() as u32)?;
    writer.write_all(audio)
}

/// Paths of a header plus sequence pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VologramPaths {
    pub header: PathBuf,
    pub sequence: PathBuf,
}

impl VologramPaths {
    /// Conventional file names inside a vologram directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            header: dir.join(HEADER_FILE_NAME),
            sequence: dir.join(SEQUENCE_FILE_NAME),
        }
    }
}

/// Write `header.vols` and `sequence_0.vols` into `dir`.
pub fn write_vologram(
    dir: &Path,
    header: &StreamHeader,
    audio: Option<&[u8]>,
    frames: &[FrameBuilder],
) -> io::Result<VologramPaths> {
    std::fs::create_dir_all(dir)?;
    let paths = VologramPaths::in_dir(dir);
    let header = with_audio_layout(header, audio, frames.len());

    let mut out = BufWriter::new(File::create(&paths.header)?);
    header.write(&mut out)?;
    if header.version >= 13 {
        write_audio_chunk(&mut out, audio)?;
    }
    out.flush()?;

    let mut sequence = SequenceWriter::new(BufWriter::new(File::create(&paths.sequence)?), header);
    for frame in frames {
        sequence.write_frame(frame)?;
    }
    sequence.finish()?;
    Ok(paths)
}

/// Write a single-file vologram (version 13 only).
pub fn write_single_file(
    path: &Path,
    header: &StreamHeader,
    audio: Option<&[u8]>,
    frames: &[FrameBuilder],
) -> io::Result<()> {
    if header.version < 13 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "single-file volograms need a version 13 header",
        ));
    }
    let header = with_audio_layout(header, audio, frames.len());
    let mut out = BufWriter::new(File::create(path)?);
    header.write(&mut out)?;
    write_audio_chunk(&mut out, audio)?;

    let mut sequence = SequenceWriter::new(out, header);
    for frame in frames {
        sequence.write_frame(frame)?;
    }
    sequence.finish()?;
    Ok(())
}

/// Fill in frame count and the version 13 audio and body offsets
fn with_audio_layout(header: &StreamHeader, audio: Option<&[u8]>, frames: usize) -> StreamHeader {
    let mut header = header.clone();
    header.frame_count = frames as u32;
    if header.version >= 13 {
        let audio_len = audio.map_or(0, |a| a.len() as u64);
        header.audio_start = audio.map(|_| V13_HEADER_SIZE);
        header.frame_body_start = Some(V13_HEADER_SIZE + 4 + audio_len);
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v10_keyframe_record_layout() {
        let header = StreamHeader::new(10, 1);
        let mut writer = SequenceWriter::new(Vec::new(), header);
        let frame = FrameBuilder::keyframe(vec![[1.0, 2.0, 3.0]], vec![0, 0, 0], vec![[0.5, 0.5]]);
        writer.write_frame(&frame).unwrap();
        let bytes = writer.finish().unwrap();

        // payload: 4 + 12 + 4 + 6 + 4 + 8 = 38, stored size excludes the index/uv size words
        assert_eq!(&bytes[0..4], &0u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &30u32.to_le_bytes());
        assert_eq!(bytes[8], 1);
        assert_eq!(bytes.len(), 9 + 38 + 4);
        assert_eq!(&bytes[bytes.len() - 4..], &30u32.to_le_bytes());
    }

    #[test]
    fn test_v12_tracked_record_layout() {
        let header = StreamHeader::new(12, 2);
        let mut writer = SequenceWriter::new(Vec::new(), header);
        writer
            .write_frame(&FrameBuilder::keyframe(vec![[0.0; 3]], vec![0, 0, 0], vec![]))
            .unwrap();
        writer
            .write_frame(&FrameBuilder::tracked(vec![[1.0; 3]]))
            .unwrap();
        assert_eq!(writer.frames_written(), 2);
        let bytes = writer.finish().unwrap();

        let second = 9 + (4 + 12 + 4 + 6 + 4) + 4;
        assert_eq!(&bytes[second..second + 4], &1u32.to_le_bytes());
        assert_eq!(&bytes[second + 4..second + 8], &16u32.to_le_bytes());
        assert_eq!(bytes[second + 8], 0);
    }

    #[test]
    fn test_single_file_requires_v13() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_single_file(&dir.path().join("a.vols"), &StreamHeader::new(12, 0), None, &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_audio_layout_offsets() {
        let header = with_audio_layout(&StreamHeader::new(13, 0), Some(&[1, 2, 3]), 4);
        assert_eq!(header.frame_count, 4);
        assert_eq!(header.audio_start, Some(44));
        assert_eq!(header.frame_body_start, Some(51));
    }
}
