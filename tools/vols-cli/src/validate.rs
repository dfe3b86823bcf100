//! Validate command - decode every frame and report failures

use anyhow::{Result, bail};
use clap::Args;

use vol_format::{DecodedFrame, ReadMode, StreamReader, decode};

use crate::input::VologramArgs;

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub vologram: VologramArgs,

    /// Stop at the first bad frame
    #[arg(long)]
    pub fail_fast: bool,
}

/// Outcome of decoding a whole sequence
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub frames: u32,
    pub keyframes: u32,
    pub max_vertices: usize,
    pub max_triangles: usize,
    pub errors: Vec<String>,
}

/// Decode frames in order, carrying topology forward the way playback does.
///
/// Tracked frames inherit from the last good keyframe.
pub fn validate_reader(reader: &mut StreamReader, fail_fast: bool) -> Result<ValidationSummary> {
    let mut summary = ValidationSummary::default();
    let mut keyframe: Option<DecodedFrame> = None;

    for frame in 0..reader.frame_count() {
        let result = reader
            .read_next_frame()
            .and_then(|raw| decode(&raw, keyframe.as_ref()));
        match result {
            Ok(decoded) => {
                summary.frames += 1;
                summary.max_vertices = summary.max_vertices.max(decoded.vertex_count());
                summary.max_triangles = summary.max_triangles.max(decoded.triangle_count());
                if decoded.is_keyframe() {
                    summary.keyframes += 1;
                    keyframe = Some(decoded);
                }
            }
            Err(e) if e.is_recoverable() => {
                summary.errors.push(format!("Frame {}: {}", frame, e));
                if fail_fast {
                    break;
                }
                // Realign after a failed read
                if reader.next_frame_index() != frame + 1 && frame + 1 < reader.frame_count() {
                    reader.seek(frame + 1)?;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}

/// Execute the validate command
pub fn execute(args: ValidateArgs) -> Result<()> {
    let (_, mut reader) = args.vologram.open(ReadMode::Streaming)?;
    println!("Validating vologram: {}", args.vologram.path.display());

    let summary = validate_reader(&mut reader, args.fail_fast)?;
    reader.close();

    println!();
    println!("=== Summary ===");
    println!("Frames decoded: {}", summary.frames);
    println!("Keyframes: {}", summary.keyframes);
    println!("Max vertices: {}", summary.max_vertices);
    println!("Max triangles: {}", summary.max_triangles);

    if !summary.errors.is_empty() {
        println!();
        println!("=== Frame Errors ===");
        for error in &summary.errors {
            println!("  {}", error);
        }
        bail!("{} frame(s) failed to decode", summary.errors.len());
    }

    println!();
    println!("All frames decode correctly.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vol_format::writer::write_vologram;
    use vol_format::{FrameBuilder, StreamHeader};

    fn triangle() -> Vec<[f32; 3]> {
        vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
    }

    fn open(frames: &[FrameBuilder]) -> (tempfile::TempDir, StreamReader) {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_vologram(dir.path(), &StreamHeader::new(12, 0), None, frames).unwrap();
        let reader = StreamReader::open(&paths.header, &paths.sequence, ReadMode::Preloaded).unwrap();
        (dir, reader)
    }

    #[test]
    fn test_valid_sequence() {
        let (_dir, mut reader) = open(&[
            FrameBuilder::keyframe(triangle(), vec![0, 1, 2], vec![[0.0; 2]; 3]),
            FrameBuilder::tracked(triangle()),
            FrameBuilder::tracked(triangle()),
        ]);
        let summary = validate_reader(&mut reader, false).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.keyframes, 1);
        assert_eq!(summary.max_triangles, 1);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_bad_frame_reported_and_skipped() {
        let (_dir, mut reader) = open(&[
            FrameBuilder::keyframe(triangle(), vec![0, 1, 2], vec![[0.0; 2]; 3]),
            FrameBuilder::tracked(vec![[0.0; 3]]),
            FrameBuilder::tracked(triangle()),
        ]);
        let summary = validate_reader(&mut reader, false).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("Frame 1:"));
    }

    #[test]
    fn test_fail_fast_stops() {
        let (_dir, mut reader) = open(&[
            FrameBuilder::keyframe(triangle(), vec![0, 1, 2], vec![[0.0; 2]; 3]),
            FrameBuilder::tracked(vec![[0.0; 3]]),
            FrameBuilder::tracked(vec![[0.0; 3]]),
        ]);
        let summary = validate_reader(&mut reader, true).unwrap();
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.frames, 1);
    }
}
