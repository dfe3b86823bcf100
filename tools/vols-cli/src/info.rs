//! Info command - print a vologram's header and frame directory

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use vol_format::{KeyframeKind, ReadMode, StreamHeader, StreamReader};

use crate::input::VologramArgs;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub vologram: VologramArgs,

    /// List every frame record
    #[arg(long)]
    pub frames: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    header: &'a StreamHeader,
    frame_count: u32,
    keyframes: &'a [u32],
    largest_frame_bytes: u64,
    audio_bytes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    frames: Vec<FrameReport>,
}

#[derive(Serialize)]
struct FrameReport {
    frame: u32,
    kind: KeyframeKind,
    offset: u64,
    length: u64,
}

fn build_report(reader: &StreamReader, with_frames: bool) -> InfoReport<'_> {
    let index = reader.frame_index();
    let frames = if with_frames {
        index
            .entries()
            .iter()
            .map(|e| FrameReport {
                frame: e.frame_index,
                kind: e.kind,
                offset: e.byte_offset,
                length: e.byte_length,
            })
            .collect()
    } else {
        Vec::new()
    };

    InfoReport {
        header: reader.header(),
        frame_count: reader.frame_count(),
        keyframes: index.keyframes(),
        largest_frame_bytes: index.largest_frame(),
        audio_bytes: reader.audio().map_or(0, <[u8]>::len),
        frames,
    }
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    let (_, reader) = args.vologram.open(ReadMode::Streaming)?;
    let report = build_report(&reader, args.frames);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
        return Ok(());
    }

    print_header(report.header);
    println!();
    println!("=== Frames ===");
    println!("  Sequence:  {}", reader.sequence_path().display());
    println!("  Frames:    {}", report.frame_count);
    println!(
        "  Keyframes: {} {}",
        report.keyframes.len(),
        abbreviate(report.keyframes)
    );
    println!("  Largest:   {} bytes", report.largest_frame_bytes);
    if report.audio_bytes > 0 {
        println!("  Audio:     {} bytes", report.audio_bytes);
    }

    if !report.frames.is_empty() {
        println!();
        println!("{:>8}  {:<12} {:>12} {:>10}", "frame", "kind", "offset", "bytes");
        for frame in &report.frames {
            println!(
                "{:>8}  {:<12} {:>12} {:>10}",
                frame.frame,
                format!("{:?}", frame.kind),
                frame.offset,
                frame.length
            );
        }
    }

    Ok(())
}

fn print_header(header: &StreamHeader) {
    println!("=== Header ===");
    println!("  Version:     {}", header.version);
    println!("  Compression: {}", header.compression);
    println!("  Normals:     {}", header.has_normals());
    println!("  Texture:     {}", header.has_texture());
    if header.has_texture() || header.texture.width > 0 {
        println!(
            "  Texture size: {}x{} (format {})",
            header.texture.width, header.texture.height, header.texture.format
        );
    }
    if !header.mesh_name.is_empty() {
        println!("  Mesh:        {}", header.mesh_name);
    }
    if !header.material.is_empty() {
        println!("  Material:    {}", header.material);
    }
    if !header.shader.is_empty() {
        println!("  Shader:      {}", header.shader);
    }
    if let Some(transform) = &header.transform {
        println!(
            "  Transform:   t={:?} r={:?} s={}",
            transform.translation, transform.rotation, transform.scale
        );
    }
    if header.fps > 0.0 {
        println!("  FPS:         {}", header.fps);
    }
}

/// First and last few keyframes of a long list
fn abbreviate(keyframes: &[u32]) -> String {
    const SHOWN: usize = 8;
    if keyframes.len() <= SHOWN {
        return format!("{:?}", keyframes);
    }
    let head: Vec<String> = keyframes[..SHOWN / 2].iter().map(u32::to_string).collect();
    let tail: Vec<String> = keyframes[keyframes.len() - SHOWN / 2..]
        .iter()
        .map(u32::to_string)
        .collect();
    format!("[{}, ..., {}]", head.join(", "), tail.join(", "))
}
