//! Stream reader
//!
//! Opens a header and sequence, builds the frame directory, and hands out
//! [`RawGeometryBlock`]s by index or sequentially.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::block::{BlockLayout, RawGeometryBlock};
use crate::error::{Error, Result};
use crate::header::StreamHeader;
use crate::index::{FrameIndex, FrameIndexEntry};

/// How frame data is fetched after open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Keep the sequence file open and read each frame on demand
    #[default]
    Streaming,
    /// Read the whole sequence into memory at open time
    Preloaded,
}

enum Source {
    Streaming { file: BufReader<File>, position: u64 },
    Preloaded(Vec<u8>),
}

impl Source {
    fn read_record(&mut self, entry: &FrameIndexEntry) -> Result<Vec<u8>> {
        let len = entry.byte_length as usize;
        match self {
            Source::Streaming { file, position } => {
                // Sequential reads land exactly on the next record
                if *position != entry.byte_offset {
                    file.seek(SeekFrom::Start(entry.byte_offset))?;
                }
                let mut record = vec![0u8; len];
                if let Err(e) = file.read_exact(&mut record) {
                    // Unknown position after a short read
                    *position = u64::MAX;
                    return Err(Error::corrupt(
                        entry.frame_index,
                        format!("sequence file too short: {}", e),
                    ));
                }
                *position = entry.byte_offset + entry.byte_length;
                Ok(record)
            }
            Source::Preloaded(bytes) => {
                let start = entry.byte_offset as usize;
                bytes
                    .get(start..start + len)
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| {
                        Error::corrupt(entry.frame_index, "frame lies outside the preloaded sequence")
                    })
            }
        }
    }
}

/// Reader over one open vologram.
///
/// Not safe for concurrent use; every read moves the underlying file cursor.
pub struct StreamReader {
    header: StreamHeader,
    index: FrameIndex,
    source: Option<Source>,
    audio: Option<Vec<u8>>,
    cursor: u32,
    sequence_path: PathBuf,
}

impl StreamReader {
    /// Open a header file and a separate sequence file.
    pub fn open(header_path: &Path, sequence_path: &Path, mode: ReadMode) -> Result<Self> {
        let header = StreamHeader::from_file(header_path)?;
        let audio = match header.audio_start {
            Some(start) => {
                let mut file = BufReader::new(File::open(header_path)?);
                Some(read_audio_chunk(&mut file, start)?)
            }
            None => None,
        };
        Self::open_sequence(header, audio, sequence_path, 0, mode)
    }

    /// Open a single-file vologram (version 13 header followed by the frame body).
    pub fn open_single(path: &Path, mode: ReadMode) -> Result<Self> {
        let header = StreamHeader::from_file(path)?;
        let Some(body_start) = header.frame_body_start else {
            return Err(Error::OpenFailed(format!(
                "{}: version {} headers cannot carry a frame body",
                path.display(),
                header.version
            )));
        };
        let audio = match header.audio_start {
            Some(start) => {
                let mut file = BufReader::new(File::open(path)?);
                Some(read_audio_chunk(&mut file, start)?)
            }
            None => None,
        };
        Self::open_sequence(header, audio, path, body_start, mode)
    }

    fn open_sequence(
        header: StreamHeader,
        audio: Option<Vec<u8>>,
        sequence_path: &Path,
        base: u64,
        mode: ReadMode,
    ) -> Result<Self> {
        let file = File::open(sequence_path).map_err(|e| {
            Error::OpenFailed(format!("{}: {}", sequence_path.display(), e))
        })?;
        let source_len = file.metadata()?.len();
        log::debug!(
            "Sequence file {} is {} bytes",
            sequence_path.display(),
            source_len
        );

        let (index, source) = match mode {
            ReadMode::Streaming => {
                let mut file = BufReader::new(file);
                let index = FrameIndex::scan(&mut file, &header, base, source_len)?;
                let position = file.stream_position()?;
                (index, Source::Streaming { file, position })
            }
            ReadMode::Preloaded => {
                let mut bytes = Vec::with_capacity(source_len as usize);
                BufReader::new(file).read_to_end(&mut bytes)?;
                let index = FrameIndex::scan(&mut Cursor::new(&bytes), &header, base, source_len)?;
                (index, Source::Preloaded(bytes))
            }
        };

        log::info!(
            "Opened vologram {} (v{}, {} frames, {} keyframes, {:?})",
            sequence_path.display(),
            header.version,
            header.frame_count,
            index.keyframes().len(),
            mode
        );

        Ok(Self {
            header,
            index,
            source: Some(source),
            audio,
            cursor: 0,
            sequence_path: sequence_path.to_path_buf(),
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn frame_index(&self) -> &FrameIndex {
        &self.index
    }

    pub fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// Embedded audio chunk of version 13 streams
    pub fn audio(&self) -> Option<&[u8]> {
        self.audio.as_deref()
    }

    pub fn sequence_path(&self) -> &Path {
        &self.sequence_path
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Frame the next [`read_next_frame`](Self::read_next_frame) call returns
    pub fn next_frame_index(&self) -> u32 {
        self.cursor
    }

    /// Move the sequential cursor without reading.
    pub fn seek(&mut self, frame: u32) -> Result<()> {
        self.check_range(frame)?;
        self.cursor = frame;
        Ok(())
    }

    /// Read any frame by index. Leaves the cursor just after it.
    pub fn read_frame(&mut self, frame: u32) -> Result<RawGeometryBlock> {
        self.check_range(frame)?;
        let entry = *self
            .index
            .get(frame)
            .ok_or(Error::FrameOutOfRange {
                frame,
                frame_count: self.index.len() as u32,
            })?;
        let source = self.source.as_mut().ok_or(Error::Closed)?;
        let record = source.read_record(&entry)?;

        let mut header_bytes = &record[..];
        let frame_number = header_bytes.read_u32::<LittleEndian>()?;
        if frame_number != frame {
            return Err(Error::corrupt(
                frame,
                format!("record holds frame number {}", frame_number),
            ));
        }

        let payload_start = entry.payload_offset() - entry.byte_offset;
        let payload_end = payload_start + entry.payload_length();
        let data = record[payload_start as usize..payload_end as usize].to_vec();
        let layout = BlockLayout::parse(&data, &self.header, entry.kind, frame)?;

        self.cursor = frame + 1;
        Ok(RawGeometryBlock {
            frame_index: frame,
            kind: entry.kind,
            data,
            layout,
        })
    }

    /// Read the frame at the cursor and advance it.
    pub fn read_next_frame(&mut self) -> Result<RawGeometryBlock> {
        self.read_frame(self.cursor)
    }

    /// Release the sequence file and any preloaded data. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("Closed vologram {}", self.sequence_path.display());
        }
        self.audio = None;
        self.cursor = 0;
    }

    fn check_range(&self, frame: u32) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::Closed);
        }
        if frame >= self.header.frame_count {
            return Err(Error::FrameOutOfRange {
                frame,
                frame_count: self.header.frame_count,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("sequence_path", &self.sequence_path)
            .field("frame_count", &self.header.frame_count)
            .field("cursor", &self.cursor)
            .field("open", &self.is_open())
            .finish()
    }
}

fn read_audio_chunk<R: Read + Seek>(reader: &mut R, start: u64) -> Result<Vec<u8>> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;
    let size = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::OpenFailed("audio chunk size is missing".into()))?;
    // Checked before allocating; the size word comes straight from the file
    let available = len.saturating_sub(start + 4);
    if size as u64 > available {
        return Err(Error::OpenFailed(format!(
            "audio chunk of {} bytes exceeds the {} bytes left in the file",
            size, available
        )));
    }
    let mut data = vec![0u8; size as usize];
    reader
        .read_exact(&mut data)
        .map_err(|_| Error::OpenFailed(format!("audio chunk of {} bytes is truncated", size)))?;
    log::debug!("Read {} bytes of embedded audio", size);
    Ok(data)
}
