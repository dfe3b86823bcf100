//! Frame decoding
//!
//! Turns a [`RawGeometryBlock`] into typed buffers. Sub-buffers a tracked
//! frame does not carry are taken from the most recently decoded keyframe,
//! never from an earlier tracked frame, so the result depends only on the
//! frame and its keyframe.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::block::{RawGeometryBlock, SubBuffer};
use crate::error::{Error, Result};
use crate::index::KeyframeKind;

/// Bytes per position or normal (3 x f32)
pub const VEC3_STRIDE: usize = 12;

/// Bytes per texture coordinate (2 x f32)
pub const UV_STRIDE: usize = 8;

/// Bytes per index (u16 in every supported version)
pub const INDEX_STRIDE: usize = 2;

/// Decoded mesh state for one frame.
///
/// Buffers are reference counted so carried-forward topology is shared
/// with the frame it came from rather than copied.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub frame_index: u32,
    pub kind: KeyframeKind,
    pub positions: Arc<[[f32; 3]]>,
    pub normals: Option<Arc<[[f32; 3]]>>,
    pub indices: Arc<[u16]>,
    pub uvs: Option<Arc<[[f32; 2]]>>,
    pub texture: Option<Arc<[u8]>>,
}

impl DecodedFrame {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_keyframe(&self) -> bool {
        self.kind.is_keyframe()
    }

    /// Positions as tightly packed bytes, ready for upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> Option<&[u8]> {
        self.normals.as_deref().map(bytemuck::cast_slice)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn uv_bytes(&self) -> Option<&[u8]> {
        self.uvs.as_deref().map(bytemuck::cast_slice)
    }

    /// Whether this frame shares its topology buffers with `other`
    pub fn shares_topology_with(&self, other: &DecodedFrame) -> bool {
        Arc::ptr_eq(&self.indices, &other.indices)
    }
}

/// Decode one block, filling absent sub-buffers from `carry_forward`.
///
/// `carry_forward` is the last decoded keyframe at or before this frame.
/// Keyframes must supply positions and indices themselves. Every index is
/// checked against the resulting vertex count.
pub fn decode(raw: &RawGeometryBlock, carry_forward: Option<&DecodedFrame>) -> Result<DecodedFrame> {
    let frame = raw.frame_index;
    raw.layout.validate(raw.data.len(), frame)?;
    let layout = raw.layout;

    // Keyframes re-establish the baseline and never inherit topology
    let carry = if raw.kind.is_keyframe() {
        None
    } else {
        carry_forward
    };

    let positions = match read_vec3(raw, layout.vertices, "vertices")? {
        Some(p) => p,
        None => match carry {
            Some(prev) => Arc::clone(&prev.positions),
            None => return Err(Error::decode_failed(frame, "no vertex positions")),
        },
    };

    let normals = match read_vec3(raw, layout.normals, "normals")? {
        Some(n) => Some(n),
        None => carry.and_then(|prev| prev.normals.clone()),
    };

    let indices = match read_indices(raw, layout.indices)? {
        Some(i) => i,
        None => match carry {
            Some(prev) => Arc::clone(&prev.indices),
            None => return Err(Error::decode_failed(frame, "no triangle indices")),
        },
    };

    let uvs = match read_uvs(raw, layout.uvs)? {
        Some(uv) => Some(uv),
        None => carry.and_then(|prev| prev.uvs.clone()),
    };

    let texture = if layout.texture.is_present() {
        Some(Arc::from(raw.bytes(layout.texture)))
    } else {
        carry.and_then(|prev| prev.texture.clone())
    };

    let vertex_count = positions.len();
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(Error::corrupt(
            frame,
            format!("index {} out of range for {} vertices", bad, vertex_count),
        ));
    }

    Ok(DecodedFrame {
        frame_index: frame,
        kind: raw.kind,
        positions,
        normals,
        indices,
        uvs,
        texture,
    })
}

fn checked_bytes<'a>(
    raw: &'a RawGeometryBlock,
    buf: SubBuffer,
    stride: usize,
    name: &str,
) -> Result<Option<&'a [u8]>> {
    if !buf.is_present() {
        return Ok(None);
    }
    if buf.size % stride != 0 {
        return Err(Error::corrupt(
            raw.frame_index,
            format!("{} size {} is not a multiple of {}", name, buf.size, stride),
        ));
    }
    Ok(Some(raw.bytes(buf)))
}

fn read_vec3(raw: &RawGeometryBlock, buf: SubBuffer, name: &str) -> Result<Option<Arc<[[f32; 3]]>>> {
    let Some(bytes) = checked_bytes(raw, buf, VEC3_STRIDE, name)? else {
        return Ok(None);
    };
    let mut out = vec![[0f32; 3]; bytes.len() / VEC3_STRIDE];
    LittleEndian::read_f32_into(bytes, bytemuck::cast_slice_mut(&mut out));
    Ok(Some(out.into()))
}

fn read_uvs(raw: &RawGeometryBlock, buf: SubBuffer) -> Result<Option<Arc<[[f32; 2]]>>> {
    let Some(bytes) = checked_bytes(raw, buf, UV_STRIDE, "uvs")? else {
        return Ok(None);
    };
    let mut out = vec![[0f32; 2]; bytes.len() / UV_STRIDE];
    LittleEndian::read_f32_into(bytes, bytemuck::cast_slice_mut(&mut out));
    Ok(Some(out.into()))
}

fn read_indices(raw: &RawGeometryBlock, buf: SubBuffer) -> Result<Option<Arc<[u16]>>> {
    let Some(bytes) = checked_bytes(raw, buf, INDEX_STRIDE, "indices")? else {
        return Ok(None);
    };
    let mut out = vec![0u16; bytes.len() / INDEX_STRIDE];
    LittleEndian::read_u16_into(bytes, &mut out);
    Ok(Some(out.into()))
}
