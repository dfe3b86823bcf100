//! Decode command - materialize one frame the way a cold skip would

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use vol_format::{DecodedFrame, KeyframeKind, ReadMode, StreamReader, decode};
use volplay_core::resolve;

use crate::input::VologramArgs;

/// Arguments for the decode command
#[derive(Args)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub vologram: VologramArgs,

    /// Frame to decode
    #[arg(short, long)]
    pub frame: u32,

    /// Number of vertices to print
    #[arg(long, default_value = "4")]
    pub vertices: usize,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct DecodeReport {
    frame: u32,
    kind: KeyframeKind,
    decoded: Vec<u32>,
    vertices: usize,
    triangles: usize,
    has_normals: bool,
    has_uvs: bool,
    texture_bytes: usize,
    positions: Vec<[f32; 3]>,
}

/// Decode `frame` from a cold reader, keyframe first when needed.
fn decode_frame(reader: &mut StreamReader, frame: u32) -> Result<(Vec<u32>, DecodedFrame)> {
    let plan = resolve(-1, frame, reader.frame_index())?;

    let mut decoded: Option<DecodedFrame> = None;
    for &index in &plan {
        let raw = reader.read_frame(index)?;
        decoded = Some(
            decode(&raw, decoded.as_ref())
                .with_context(|| format!("Failed to decode frame {}", index))?,
        );
    }
    let decoded = decoded.context("Decode plan was empty")?;
    Ok((plan.frames().to_vec(), decoded))
}

fn build_report(plan: Vec<u32>, frame: &DecodedFrame, vertices: usize) -> DecodeReport {
    DecodeReport {
        frame: frame.frame_index,
        kind: frame.kind,
        decoded: plan,
        vertices: frame.vertex_count(),
        triangles: frame.triangle_count(),
        has_normals: frame.normals.is_some(),
        has_uvs: frame.uvs.is_some(),
        texture_bytes: frame.texture.as_ref().map_or(0, |t| t.len()),
        positions: frame.positions.iter().take(vertices).copied().collect(),
    }
}

/// Execute the decode command
pub fn execute(args: DecodeArgs) -> Result<()> {
    let (_, mut reader) = args.vologram.open(ReadMode::Streaming)?;
    let (plan, frame) = decode_frame(&mut reader, args.frame)?;
    let report = build_report(plan, &frame, args.vertices);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== Frame {} ({:?}) ===", report.frame, report.kind);
    println!("  Decoded:   {:?}", report.decoded);
    println!("  Vertices:  {}", report.vertices);
    println!("  Triangles: {}", report.triangles);
    println!("  Normals:   {}", report.has_normals);
    println!("  UVs:       {}", report.has_uvs);
    if report.texture_bytes > 0 {
        println!("  Texture:   {} bytes", report.texture_bytes);
    }
    for (i, p) in report.positions.iter().enumerate() {
        println!("  v{:<4} {:>10.4} {:>10.4} {:>10.4}", i, p[0], p[1], p[2]);
    }
    if report.vertices > report.positions.len() {
        println!("  ... {} more", report.vertices - report.positions.len());
    }
    Ok(())
}
