//! Synth command - generate a test vologram
//!
//! Produces a rippling grid: keyframes re-triangulate the grid and swap the
//! diagonal direction, tracked frames only move vertices.

use anyhow::{Context, Result, bail};
use clap::Args;
use std::f32::consts::TAU;
use std::path::PathBuf;

use vol_format::header::{MAX_VERSION, MIN_VERSION};
use vol_format::writer::{write_single_file, write_vologram};
use vol_format::{ComponentFlags, FrameBuilder, StreamHeader};

/// Arguments for the synth command
#[derive(Args)]
pub struct SynthArgs {
    /// Output directory, or file with --single
    pub output: PathBuf,

    /// Number of frames
    #[arg(long, default_value = "90")]
    pub frames: u32,

    /// Frames between keyframes
    #[arg(long, default_value = "30")]
    pub keyframe_interval: u32,

    /// Format version (10-13)
    #[arg(long, default_value = "12")]
    pub version: u32,

    /// Grid cells per side
    #[arg(long, default_value = "8")]
    pub grid: u16,

    /// Include vertex normals (version 11+)
    #[arg(long)]
    pub normals: bool,

    /// Frame rate stored in version 13 headers
    #[arg(long, default_value = "30")]
    pub fps: f32,

    /// Write a single-file vologram (version 13)
    #[arg(long)]
    pub single: bool,
}

/// Grid mesh generator
struct Ripple {
    cells: u16,
    frames: u32,
}

impl Ripple {
    fn side(&self) -> u16 {
        self.cells + 1
    }

    fn positions(&self, frame: u32) -> Vec<[f32; 3]> {
        let side = self.side() as f32;
        let phase = frame as f32 / self.frames.max(1) as f32 * TAU;
        (0..self.side())
            .flat_map(|row| (0..self.side()).map(move |col| (row, col)))
            .map(|(row, col)| {
                let x = col as f32 / (side - 1.0) - 0.5;
                let z = row as f32 / (side - 1.0) - 0.5;
                let r = (x * x + z * z).sqrt();
                [x, 0.1 * (r * TAU * 2.0 - phase).sin(), z]
            })
            .collect()
    }

    fn normals(&self, positions: &[[f32; 3]]) -> Vec<[f32; 3]> {
        positions.iter().map(|_| [0.0, 1.0, 0.0]).collect()
    }

    fn uvs(&self) -> Vec<[f32; 2]> {
        let last = self.cells as f32;
        (0..self.side())
            .flat_map(|row| (0..self.side()).map(move |col| [col as f32 / last, row as f32 / last]))
            .collect()
    }

    /// Two triangles per cell, diagonal direction chosen by `flip`
    fn indices(&self, flip: bool) -> Vec<u16> {
        let side = self.side();
        let mut indices = Vec::with_capacity(self.cells as usize * self.cells as usize * 6);
        for row in 0..self.cells {
            for col in 0..self.cells {
                let a = row * side + col;
                let b = a + 1;
                let c = a + side;
                let d = c + 1;
                if flip {
                    indices.extend_from_slice(&[a, c, d, a, d, b]);
                } else {
                    indices.extend_from_slice(&[a, c, b, b, c, d]);
                }
            }
        }
        indices
    }
}

fn validate_args(args: &SynthArgs) -> Result<()> {
    if !(MIN_VERSION..=MAX_VERSION).contains(&args.version) {
        bail!(
            "Unsupported version {} (expected {}-{})",
            args.version,
            MIN_VERSION,
            MAX_VERSION
        );
    }
    if args.frames == 0 {
        bail!("--frames must be at least 1");
    }
    if args.keyframe_interval == 0 {
        bail!("--keyframe-interval must be at least 1");
    }
    if args.grid == 0 || (args.grid as u32 + 1).pow(2) > u16::MAX as u32 + 1 {
        bail!("--grid must be between 1 and 255");
    }
    if args.single && args.version < 13 {
        bail!("--single needs --version 13");
    }
    if args.normals && args.version < 11 {
        bail!("--normals needs version 11 or later");
    }
    Ok(())
}

/// Build the header and frames for `args`.
fn build(args: &SynthArgs) -> (StreamHeader, Vec<FrameBuilder>) {
    let ripple = Ripple {
        cells: args.grid,
        frames: args.frames,
    };

    let mut header = StreamHeader::new(args.version, args.frames);
    header.mesh_name = "ripple".to_string();
    if args.normals {
        header.components |= ComponentFlags::NORMALS;
    }
    if args.version >= 13 {
        header.fps = args.fps;
    }

    let uvs = ripple.uvs();
    let frames = (0..args.frames)
        .map(|frame| {
            let positions = ripple.positions(frame);
            let normals = args.normals.then(|| ripple.normals(&positions));
            let builder = if frame % args.keyframe_interval == 0 {
                let flip = (frame / args.keyframe_interval) % 2 == 1;
                FrameBuilder::keyframe(positions, ripple.indices(flip), uvs.clone())
            } else {
                FrameBuilder::tracked(positions)
            };
            match normals {
                Some(normals) => builder.with_normals(normals),
                None => builder,
            }
        })
        .collect();
    (header, frames)
}

/// Execute the synth command
pub fn execute(args: SynthArgs) -> Result<()> {
    validate_args(&args)?;
    let (header, frames) = build(&args);

    if args.single {
        write_single_file(&args.output, &header, None, &frames)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    } else {
        write_vologram(&args.output, &header, None, &frames)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
    }

    let keyframes = frames.iter().filter(|f| f.kind.is_keyframe()).count();
    println!("Wrote {}", args.output.display());
    println!("  Version:   {}", header.version);
    println!("  Frames:    {}", frames.len());
    println!("  Keyframes: {}", keyframes);
    println!("  Vertices:  {}", frames[0].positions.len());
    println!("  Triangles: {}", frames[0].indices.len() / 3);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vol_format::{ReadMode, StreamReader, decode};

    fn args(output: PathBuf) -> SynthArgs {
        SynthArgs {
            output,
            frames: 10,
            keyframe_interval: 4,
            version: 12,
            grid: 3,
            normals: false,
            fps: 30.0,
            single: false,
        }
    }

    #[test]
    fn test_grid_topology() {
        let ripple = Ripple { cells: 3, frames: 1 };
        assert_eq!(ripple.positions(0).len(), 16);
        assert_eq!(ripple.uvs().len(), 16);

        let indices = ripple.indices(false);
        assert_eq!(indices.len(), 3 * 3 * 6);
        assert!(indices.iter().all(|&i| i < 16));
        assert_ne!(indices, ripple.indices(true));
    }

    #[test]
    fn test_keyframe_placement() {
        let dir = tempfile::tempdir().unwrap();
        let (header, frames) = build(&args(dir.path().to_path_buf()));
        assert_eq!(header.frame_count, 10);
        let keyframes: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind.is_keyframe())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(keyframes, vec![0, 4, 8]);
    }

    #[test]
    fn test_written_vologram_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = args(dir.path().join("clip"));
        synth.version = 11;
        synth.normals = true;
        execute(synth).unwrap();

        let clip = dir.path().join("clip");
        let mut reader = StreamReader::open(
            &clip.join(vol_format::HEADER_FILE_NAME),
            &clip.join(vol_format::SEQUENCE_FILE_NAME),
            ReadMode::Streaming,
        )
        .unwrap();
        assert_eq!(reader.frame_index().keyframes(), &[0, 4, 8]);

        let mut keyframe = None;
        for _ in 0..reader.frame_count() {
            let raw = reader.read_next_frame().unwrap();
            let frame = decode(&raw, keyframe.as_ref()).unwrap();
            assert!(frame.normals.is_some());
            if frame.is_keyframe() {
                keyframe = Some(frame);
            }
        }
    }

    #[test]
    fn test_single_file_needs_v13() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = args(dir.path().join("clip.vols"));
        synth.single = true;
        assert!(validate_args(&synth).is_err());
        synth.version = 13;
        assert!(validate_args(&synth).is_ok());
    }
}
