//! Vols vologram geometry streams
//!
//! A vologram is a header plus a sequence of mesh frames. Keyframes carry
//! full topology (indices and UVs); tracked frames only move vertices and
//! inherit everything else from their keyframe.
//!
//! - [`header`] parses `header.vols` for format versions 10 to 13
//! - [`index`] walks the sequence file and builds the frame directory
//! - [`reader`] hands out raw frame blocks by index or sequentially
//! - [`decoder`] turns raw blocks into typed vertex, index and UV buffers
//! - [`writer`] produces header and sequence files

pub mod block;
pub mod decoder;
pub mod error;
pub mod header;
pub mod index;
pub mod reader;
pub mod writer;

pub use block::{BlockLayout, RawGeometryBlock, SubBuffer};
pub use decoder::{decode, DecodedFrame};
pub use error::{Error, Result};
pub use header::{ComponentFlags, StreamHeader};
pub use index::{FrameIndex, FrameIndexEntry, KeyframeKind};
pub use reader::{ReadMode, StreamReader};
pub use writer::{FrameBuilder, SequenceWriter, VologramPaths};

/// Conventional header file name inside a vologram directory
pub const HEADER_FILE_NAME: &str = "header.vols";

/// Conventional name of the first sequence file
pub const SEQUENCE_FILE_NAME: &str = "sequence_0.vols";
