//! Vols stream header (`header.vols`)
//!
//! Two header layouts exist. Versions 10 to 12 use length-prefixed strings
//! and grow a few fields per version. Version 13 replaced them with a fixed
//! 44-byte header that can be followed by an audio chunk and the frame body
//! in the same file.
//!
//! # Layout (versions 10-12)
//! ```text
//! short_str  format          u8 length (4) + "VOLS"
//! u32        version
//! u32        compression
//! short_str  mesh_name       u8 length (<= 127) + bytes
//! short_str  material
//! short_str  shader
//! u32        topology
//! u32        frame_count
//! -- version >= 11
//! u8         normals
//! u8         textured
//! u16        texture_width
//! u16        texture_height
//! u16        texture_format
//! -- version >= 12
//! f32 x3     translation
//! f32 x4     rotation
//! f32        scale
//! ```
//!
//! # Layout (version 13, 44 bytes)
//! ```text
//! 0x00: magic "VOLS"
//! 0x04: version u32
//! 0x08: compression u32
//! 0x0C: frame_count u32
//! 0x10: normals u8, textured u8, texture_compression u8, texture_container_format u8
//! 0x14: texture_width u32
//! 0x18: texture_height u32
//! 0x1C: fps f32
//! 0x20: audio u32 (0 = none)
//! 0x24: audio_start u32
//! 0x28: frame_body_start u32
//! ```
//!
//! All values are little-endian.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Format magic, as stored in every header version
pub const MAGIC: &[u8; 4] = b"VOLS";

/// Oldest supported format version
pub const MIN_VERSION: u32 = 10;

/// Newest supported format version
pub const MAX_VERSION: u32 = 13;

/// Size of the fixed version 13 header
pub const V13_HEADER_SIZE: u64 = 44;

/// Smallest legal legacy header (format string, version, compression, three empty strings, topology, frame count)
const MIN_LEGACY_HEADER_SIZE: u64 = 24;

/// Longest legal short string
const MAX_SHORT_STR_LEN: u8 = 127;

bitflags::bitflags! {
    /// Per-component presence flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ComponentFlags: u8 {
        /// Frames carry per-vertex normals
        const NORMALS = 0b0000_0001;
        /// Keyframes carry texture coordinates
        const UVS = 0b0000_0010;
        /// Frames carry an embedded texture blob
        const TEXTURE = 0b0000_0100;
    }
}

// Manual serde implementation for ComponentFlags
impl Serialize for ComponentFlags {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ComponentFlags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(ComponentFlags::from_bits_truncate(bits))
    }
}

/// Embedded texture description
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    /// Pixel format code (versions 11-12)
    pub format: u16,
    /// Compression code (version 13)
    pub compression: u8,
    /// Container format code (version 13)
    pub container_format: u8,
}

/// Model transform stored by version 12 headers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
            scale: 1.0,
        }
    }
}

/// Parsed stream header. Immutable once the stream is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub version: u32,
    pub compression: u32,
    pub frame_count: u32,
    pub components: ComponentFlags,
    pub mesh_name: String,
    pub material: String,
    pub shader: String,
    pub topology: u32,
    pub texture: TextureInfo,
    /// Present for version 12
    pub transform: Option<Transform>,
    /// Frame rate reported by the stream, `0.0` when unknown
    pub fps: f32,
    /// Byte offset of the audio chunk (version 13 with audio)
    pub audio_start: Option<u64>,
    /// Byte offset of the frame body within a single-file vologram (version 13)
    pub frame_body_start: Option<u64>,
}

impl StreamHeader {
    /// Create a header with no optional components.
    pub fn new(version: u32, frame_count: u32) -> Self {
        Self {
            version,
            compression: 0,
            frame_count,
            components: ComponentFlags::UVS,
            mesh_name: String::new(),
            material: String::new(),
            shader: String::new(),
            topology: 0,
            texture: TextureInfo::default(),
            transform: (version == 12).then(Transform::default),
            fps: 0.0,
            audio_start: None,
            frame_body_start: (version >= 13).then_some(V13_HEADER_SIZE + 4),
        }
    }

    pub fn has_normals(&self) -> bool {
        self.components.contains(ComponentFlags::NORMALS)
    }

    pub fn has_uvs(&self) -> bool {
        self.components.contains(ComponentFlags::UVS)
    }

    pub fn has_texture(&self) -> bool {
        self.components.contains(ComponentFlags::TEXTURE)
    }

    /// Whether frames of this version may use keyframe type 2 (last tracked frame)
    pub fn supports_last_tracked(&self) -> bool {
        self.version >= 12
    }

    /// Read a header file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::OpenFailed(format!("{}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();
        if len < MIN_LEGACY_HEADER_SIZE {
            return Err(Error::OpenFailed(format!(
                "{}: header is {} bytes, expected at least {}",
                path.display(),
                len,
                MIN_LEGACY_HEADER_SIZE
            )));
        }
        Self::read(&mut BufReader::new(file))
    }

    /// Read a header of any supported version.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let first = reader.read_u8().map_err(truncated)?;
        if first == MAGIC[0] {
            let mut rest = [0u8; 3];
            reader.read_exact(&mut rest).map_err(truncated)?;
            if rest != MAGIC[1..] {
                return Err(Error::OpenFailed("bad header magic".into()));
            }
            Self::read_v13(reader)
        } else {
            let format = read_short_str_body(reader, first, "format")?;
            if format.as_bytes() != MAGIC {
                return Err(Error::OpenFailed(format!(
                    "bad header format string {:?}",
                    format
                )));
            }
            Self::read_legacy(reader)
        }
    }

    fn read_legacy<R: Read>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        if !(MIN_VERSION..=12).contains(&version) {
            return Err(unsupported(version));
        }
        let compression = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let mesh_name = read_short_str(reader, "mesh_name")?;
        let material = read_short_str(reader, "material")?;
        let shader = read_short_str(reader, "shader")?;
        let topology = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let frame_count = reader.read_u32::<LittleEndian>().map_err(truncated)?;

        let mut components = ComponentFlags::UVS;
        let mut texture = TextureInfo::default();
        if version >= 11 {
            let normals = reader.read_u8().map_err(truncated)?;
            let textured = reader.read_u8().map_err(truncated)?;
            components.set(ComponentFlags::NORMALS, normals != 0);
            components.set(ComponentFlags::TEXTURE, textured != 0);
            texture.width = reader.read_u16::<LittleEndian>().map_err(truncated)? as u32;
            texture.height = reader.read_u16::<LittleEndian>().map_err(truncated)? as u32;
            texture.format = reader.read_u16::<LittleEndian>().map_err(truncated)?;
        }

        let transform = if version >= 12 {
            let mut translation = [0f32; 3];
            reader
                .read_f32_into::<LittleEndian>(&mut translation)
                .map_err(truncated)?;
            let mut rotation = [0f32; 4];
            reader
                .read_f32_into::<LittleEndian>(&mut rotation)
                .map_err(truncated)?;
            let scale = reader.read_f32::<LittleEndian>().map_err(truncated)?;
            Some(Transform {
                translation,
                rotation,
                scale,
            })
        } else {
            None
        };

        Ok(Self {
            version,
            compression,
            frame_count,
            components,
            mesh_name,
            material,
            shader,
            topology,
            texture,
            transform,
            fps: 0.0,
            audio_start: None,
            frame_body_start: None,
        })
    }

    fn read_v13<R: Read>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        if version != MAX_VERSION {
            return Err(unsupported(version));
        }
        let compression = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let frame_count = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let normals = reader.read_u8().map_err(truncated)?;
        let textured = reader.read_u8().map_err(truncated)?;
        let texture_compression = reader.read_u8().map_err(truncated)?;
        let texture_container_format = reader.read_u8().map_err(truncated)?;
        let width = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let height = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let fps = reader.read_f32::<LittleEndian>().map_err(truncated)?;
        let audio = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let audio_start = reader.read_u32::<LittleEndian>().map_err(truncated)? as u64;
        let frame_body_start = reader.read_u32::<LittleEndian>().map_err(truncated)? as u64;

        if audio != 0 && audio_start < V13_HEADER_SIZE {
            return Err(Error::OpenFailed(format!(
                "audio chunk at {} overlaps the header",
                audio_start
            )));
        }
        if frame_body_start < V13_HEADER_SIZE {
            return Err(Error::OpenFailed(format!(
                "frame body at {} overlaps the header",
                frame_body_start
            )));
        }

        let mut components = ComponentFlags::UVS;
        components.set(ComponentFlags::NORMALS, normals != 0);
        components.set(ComponentFlags::TEXTURE, textured != 0);

        Ok(Self {
            version,
            compression,
            frame_count,
            components,
            mesh_name: String::new(),
            material: String::new(),
            shader: String::new(),
            topology: 0,
            texture: TextureInfo {
                width,
                height,
                format: 0,
                compression: texture_compression,
                container_format: texture_container_format,
            },
            transform: None,
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 0.0 },
            audio_start: (audio != 0).then_some(audio_start),
            frame_body_start: Some(frame_body_start),
        })
    }

    /// Write this header in the layout of its version.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if self.version >= 13 {
            return self.write_v13(writer);
        }

        write_short_str(writer, "VOLS")?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.compression)?;
        write_short_str(writer, &self.mesh_name)?;
        write_short_str(writer, &self.material)?;
        write_short_str(writer, &self.shader)?;
        writer.write_u32::<LittleEndian>(self.topology)?;
        writer.write_u32::<LittleEndian>(self.frame_count)?;

        if self.version >= 11 {
            writer.write_u8(self.has_normals() as u8)?;
            writer.write_u8(self.has_texture() as u8)?;
            writer.write_u16::<LittleEndian>(self.texture.width as u16)?;
            writer.write_u16::<LittleEndian>(self.texture.height as u16)?;
            writer.write_u16::<LittleEndian>(self.texture.format)?;
        }

        if self.version >= 12 {
            let transform = self.transform.unwrap_or_default();
            for v in transform.translation.iter().chain(transform.rotation.iter()) {
                writer.write_f32::<LittleEndian>(*v)?;
            }
            writer.write_f32::<LittleEndian>(transform.scale)?;
        }

        Ok(())
    }

    fn write_v13<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.compression)?;
        writer.write_u32::<LittleEndian>(self.frame_count)?;
        writer.write_u8(self.has_normals() as u8)?;
        writer.write_u8(self.has_texture() as u8)?;
        writer.write_u8(self.texture.compression)?;
        writer.write_u8(self.texture.container_format)?;
        writer.write_u32::<LittleEndian>(self.texture.width)?;
        writer.write_u32::<LittleEndian>(self.texture.height)?;
        writer.write_f32::<LittleEndian>(self.fps)?;
        writer.write_u32::<LittleEndian>(self.audio_start.is_some() as u32)?;
        writer.write_u32::<LittleEndian>(self.audio_start.unwrap_or(V13_HEADER_SIZE) as u32)?;
        writer.write_u32::<LittleEndian>(
            self.frame_body_start.unwrap_or(V13_HEADER_SIZE + 4) as u32,
        )?;
        Ok(())
    }
}

fn read_short_str<R: Read>(reader: &mut R, field: &str) -> Result<String> {
    let len = reader.read_u8().map_err(truncated)?;
    read_short_str_body(reader, len, field)
}

fn read_short_str_body<R: Read>(reader: &mut R, len: u8, field: &str) -> Result<String> {
    if len > MAX_SHORT_STR_LEN {
        return Err(Error::OpenFailed(format!(
            "{} string length {} exceeds {}",
            field, len, MAX_SHORT_STR_LEN
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(truncated)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_short_str<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_SHORT_STR_LEN as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("short string of {} bytes is too long", bytes.len()),
        ));
    }
    writer.write_u8(bytes.len() as u8)?;
    writer.write_all(bytes)
}

fn truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::OpenFailed("header is truncated".into())
    } else {
        Error::Io(e)
    }
}

fn unsupported(version: u32) -> Error {
    Error::OpenFailed(format!(
        "unsupported format version {} (supported: {}-{})",
        version, MIN_VERSION, MAX_VERSION
    ))
}
