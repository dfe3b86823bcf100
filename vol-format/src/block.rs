//! Raw geometry blocks and their sub-buffer layout
//!
//! A frame payload is a run of size-prefixed sections:
//! ```text
//! u32 size + bytes   vertices
//! u32 size + bytes   normals   (header.normals, version >= 11)
//! u32 size + bytes   indices   (frames carrying topology)
//! u32 size + bytes   uvs       (frames carrying topology)
//! u32 size + bytes   texture   (header.textured, version >= 11)
//! ```

use serde::Serialize;

use crate::error::{Error, Result};
use crate::header::StreamHeader;
use crate::index::KeyframeKind;

/// Byte range of one sub-buffer within a block. Size zero means absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubBuffer {
    pub offset: usize,
    pub size: usize,
}

impl SubBuffer {
    pub const ABSENT: Self = Self { offset: 0, size: 0 };

    pub fn is_present(&self) -> bool {
        self.size > 0
    }

    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.size)
    }

    /// Borrow the sub-buffer's bytes, or `None` if it lies outside `data`.
    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        data.get(self.offset..self.end()?)
    }
}

/// Offsets and sizes of every sub-buffer in a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockLayout {
    pub vertices: SubBuffer,
    pub normals: SubBuffer,
    pub indices: SubBuffer,
    pub uvs: SubBuffer,
    pub texture: SubBuffer,
}

impl BlockLayout {
    /// Locate the sub-buffers of a frame payload.
    pub fn parse(
        payload: &[u8],
        header: &StreamHeader,
        kind: KeyframeKind,
        frame: u32,
    ) -> Result<Self> {
        let mut cursor = SectionCursor {
            payload,
            offset: 0,
            frame,
        };
        let mut layout = Self {
            vertices: cursor.next_section("vertices")?,
            ..Self::default()
        };
        if header.has_normals() && header.version >= 11 {
            layout.normals = cursor.next_section("normals")?;
        }
        if kind.carries_topology(header.version) {
            layout.indices = cursor.next_section("indices")?;
            layout.uvs = cursor.next_section("uvs")?;
        }
        if header.has_texture() && header.version >= 11 {
            layout.texture = cursor.next_section("texture")?;
        }
        Ok(layout)
    }

    fn named(&self) -> [(&'static str, SubBuffer); 5] {
        [
            ("vertices", self.vertices),
            ("normals", self.normals),
            ("indices", self.indices),
            ("uvs", self.uvs),
            ("texture", self.texture),
        ]
    }

    /// Check every present sub-buffer lies within `len` bytes and none overlap.
    pub fn validate(&self, len: usize, frame: u32) -> Result<()> {
        let mut spans: Vec<(&str, usize, usize)> = Vec::with_capacity(5);
        for (name, buf) in self.named() {
            if !buf.is_present() {
                continue;
            }
            let end = buf
                .end()
                .filter(|&end| end <= len)
                .ok_or_else(|| {
                    Error::corrupt(
                        frame,
                        format!(
                            "{} range {}+{} exceeds block of {} bytes",
                            name, buf.offset, buf.size, len
                        ),
                    )
                })?;
            spans.push((name, buf.offset, end));
        }

        spans.sort_by_key(|&(_, start, _)| start);
        for pair in spans.windows(2) {
            let (a, _, a_end) = pair[0];
            let (b, b_start, _) = pair[1];
            if b_start < a_end {
                return Err(Error::corrupt(
                    frame,
                    format!("{} overlaps {}", b, a),
                ));
            }
        }
        Ok(())
    }
}

struct SectionCursor<'a> {
    payload: &'a [u8],
    offset: usize,
    frame: u32,
}

impl SectionCursor<'_> {
    fn next_section(&mut self, name: &str) -> Result<SubBuffer> {
        let size_end = self.offset + 4;
        let size_bytes = self
            .payload
            .get(self.offset..size_end)
            .ok_or_else(|| Error::corrupt(self.frame, format!("{} size word is missing", name)))?;
        let size = u32::from_le_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]])
            as usize;
        // Sizes are signed in the format; anything past i32::MAX is a negative size
        if size > i32::MAX as usize {
            return Err(Error::corrupt(self.frame, format!("{} size is negative", name)));
        }
        if size_end + size > self.payload.len() {
            return Err(Error::corrupt(
                self.frame,
                format!(
                    "{} section of {} bytes at {} exceeds payload of {} bytes",
                    name,
                    size,
                    size_end,
                    self.payload.len()
                ),
            ));
        }
        self.offset = size_end + size;
        Ok(SubBuffer {
            offset: size_end,
            size,
        })
    }
}

/// One frame's payload plus its sub-buffer layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGeometryBlock {
    pub frame_index: u32,
    pub kind: KeyframeKind,
    pub data: Vec<u8>,
    pub layout: BlockLayout,
}

impl RawGeometryBlock {
    pub fn is_keyframe(&self) -> bool {
        self.kind.is_keyframe()
    }

    /// Bytes of a sub-buffer. Callers must have validated the layout.
    pub fn bytes(&self, buf: SubBuffer) -> &[u8] {
        buf.slice(&self.data).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ComponentFlags;

    fn section(out: &mut Vec<u8>, bytes: &[u8]) {
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
    }

    #[test]
    fn test_keyframe_layout() {
        let header = StreamHeader::new(12, 1);
        let mut payload = Vec::new();
        section(&mut payload, &[0u8; 36]);
        section(&mut payload, &[0u8; 6]);
        section(&mut payload, &[0u8; 24]);

        let layout = BlockLayout::parse(&payload, &header, KeyframeKind::Keyframe, 0).unwrap();
        assert_eq!(layout.vertices, SubBuffer { offset: 4, size: 36 });
        assert_eq!(layout.indices, SubBuffer { offset: 44, size: 6 });
        assert_eq!(layout.uvs, SubBuffer { offset: 54, size: 24 });
        assert!(!layout.normals.is_present());
        assert!(!layout.texture.is_present());
        layout.validate(payload.len(), 0).unwrap();
    }

    #[test]
    fn test_tracked_frame_skips_topology() {
        let mut header = StreamHeader::new(11, 1);
        header.components |= ComponentFlags::NORMALS;
        let mut payload = Vec::new();
        section(&mut payload, &[0u8; 12]);
        section(&mut payload, &[0u8; 12]);

        let layout = BlockLayout::parse(&payload, &header, KeyframeKind::Tracked, 3).unwrap();
        assert_eq!(layout.normals, SubBuffer { offset: 20, size: 12 });
        assert!(!layout.indices.is_present());
        assert!(!layout.uvs.is_present());
    }

    #[test]
    fn test_last_tracked_before_v12_has_no_topology() {
        let header = StreamHeader::new(11, 1);
        let mut payload = Vec::new();
        section(&mut payload, &[0u8; 12]);
        section(&mut payload, &[]);

        let layout =
            BlockLayout::parse(&payload, &header, KeyframeKind::LastTracked, 1).unwrap();
        assert!(!layout.indices.is_present());
    }

    #[test]
    fn test_section_past_end_is_corrupt() {
        let header = StreamHeader::new(12, 1);
        let mut payload = Vec::new();
        payload.extend_from_slice(&100u32.to_le_bytes());
        payload.extend_from_slice(&[0u8; 10]);

        let err = BlockLayout::parse(&payload, &header, KeyframeKind::Tracked, 7).unwrap_err();
        assert!(matches!(err, Error::CorruptFrame { frame: 7, .. }));
    }

    #[test]
    fn test_missing_size_word_is_corrupt() {
        let header = StreamHeader::new(12, 1);
        let mut payload = Vec::new();
        section(&mut payload, &[0u8; 12]);

        let err = BlockLayout::parse(&payload, &header, KeyframeKind::Keyframe, 0).unwrap_err();
        assert!(err.to_string().contains("indices size word is missing"));
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let layout = BlockLayout {
            vertices: SubBuffer { offset: 0, size: 24 },
            indices: SubBuffer { offset: 12, size: 6 },
            ..BlockLayout::default()
        };
        let err = layout.validate(64, 2).unwrap_err();
        assert!(err.to_string().contains("indices overlaps vertices"));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        let layout = BlockLayout {
            vertices: SubBuffer { offset: 8, size: 24 },
            ..BlockLayout::default()
        };
        assert!(layout.validate(16, 0).is_err());
        assert!(layout.validate(32, 0).is_ok());
    }
}
