//! Play command - run the playback scheduler headless and report what it did
//!
//! The player is ticked with a fixed host frame time, as a render loop
//! would, without sleeping between ticks.

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;

use vol_format::ReadMode;
use volplay_core::config::Config;
use volplay_core::{
    LatestFrameSink, Player, PlayerConfig, RawVideoSource, StepOutcome, TickOutcome,
    VologramSource,
};

use crate::input::VologramArgs;

/// Arguments for the play command
#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    pub vologram: VologramArgs,

    /// Host render rate in ticks per second
    #[arg(long, default_value = "60")]
    pub fps: f64,

    /// Loop at the end instead of stopping
    #[arg(long = "loop")]
    pub looping: bool,

    /// Seconds of playback to simulate (default: one pass)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Load the whole sequence into memory first
    #[arg(long)]
    pub preload: bool,

    /// Raw RGB24 video texture to play alongside
    #[arg(long)]
    pub video: Option<PathBuf>,
}

/// Counters gathered over a simulated run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayStats {
    pub ticks: u64,
    pub advanced: u64,
    pub frames_decoded: u64,
    pub stalled: Vec<u32>,
    pub loops: u32,
    pub finished: bool,
    pub last_frame: i64,
    pub color_uploads: u64,
}

fn player_config(args: &PlayArgs, config: &Config) -> PlayerConfig {
    let mut player = config.playback.clone();
    player.looping = args.looping;
    if args.preload {
        player.read_mode = ReadMode::Preloaded;
    }
    player
}

/// Attach the video from the arguments or the config file, if any.
fn attach_video(
    player: &mut Player<LatestFrameSink>,
    args: &PlayArgs,
    config: &Config,
    source: &VologramSource,
) -> Result<()> {
    let Some(path) = args.video.clone().or_else(|| config.video.path.clone()) else {
        return Ok(());
    };

    let (mut width, mut height) = (config.video.width, config.video.height);
    if width == 0 || height == 0 {
        let header = source
            .open_reader(ReadMode::Streaming)
            .map(|reader| reader.header().texture)
            .context("Failed to read header for video size")?;
        width = header.width;
        height = header.height;
    }
    if width == 0 || height == 0 {
        bail!("Video size unknown: set [video] width and height in the config");
    }

    tracing::info!(path = %path.display(), width, height, "Attaching video texture");
    player.set_video(
        Box::new(RawVideoSource::new(width, height, config.video.frame_rate)),
        path,
    );
    Ok(())
}

/// Tick `player` at `tick_rate` for `duration` seconds.
pub fn run(
    player: &mut Player<LatestFrameSink>,
    tick_rate: f64,
    duration: f64,
) -> Result<PlayStats> {
    let dt = 1.0 / tick_rate;
    let ticks = (duration * tick_rate).ceil() as u64;
    let mut stats = PlayStats::default();

    for _ in 0..ticks {
        stats.ticks += 1;
        match player.tick(dt)? {
            TickOutcome::Advanced(plan) => {
                stats.advanced += 1;
                stats.frames_decoded += plan.len() as u64;
            }
            TickOutcome::Stalled { frame } => stats.stalled.push(frame),
            TickOutcome::Looped => stats.loops += 1,
            TickOutcome::Finished => {
                stats.finished = true;
                break;
            }
            TickOutcome::Idle | TickOutcome::Waiting => {}
        }
        stats.last_frame = player.frame();
    }

    stats.color_uploads = player.sink().color_uploads;
    Ok(stats)
}

/// Step through every frame once without a clock.
pub fn run_stepped(player: &mut Player<LatestFrameSink>) -> Result<PlayStats> {
    let mut stats = PlayStats::default();
    let total = player.state().total_frame_count;
    for _ in 0..total {
        stats.ticks += 1;
        match player.step()? {
            StepOutcome::Advanced(plan) => {
                stats.advanced += 1;
                stats.frames_decoded += plan.len() as u64;
            }
            StepOutcome::Looped => stats.loops += 1,
            StepOutcome::AtEnd => {
                stats.finished = true;
                break;
            }
        }
        stats.last_frame = player.frame();
    }
    stats.color_uploads = player.sink().color_uploads;
    Ok(stats)
}

/// Execute the play command
pub fn execute(args: PlayArgs, config: &Config) -> Result<()> {
    if !(args.fps.is_finite() && args.fps > 0.0) {
        bail!("--fps must be positive, got {}", args.fps);
    }

    let source = args.vologram.source()?;
    let mut player = Player::new(player_config(&args, config), LatestFrameSink::default());
    attach_video(&mut player, &args, config, &source)?;
    player
        .open_source(source)
        .with_context(|| format!("Failed to open vologram: {}", args.vologram.path.display()))?;

    let state = player.state().clone();
    let duration = args
        .duration
        .unwrap_or(state.total_frame_count as f64 * state.seconds_per_frame);

    println!("=== Playing ===");
    println!("  Frames:      {}", state.total_frame_count);
    println!("  Stream rate: {:.3} fps", state.frame_rate());
    println!("  Tick rate:   {} Hz", args.fps);
    println!("  Duration:    {:.3} s", duration);

    let stats = if player.config().play_on_start {
        player.play();
        run(&mut player, args.fps, duration)?
    } else {
        println!("  play_on_start is off, stepping frame by frame");
        run_stepped(&mut player)?
    };
    player.close();

    println!();
    println!("=== Summary ===");
    println!("Ticks: {}", stats.ticks);
    println!("Frames shown: {}", stats.advanced);
    println!("Frames decoded: {}", stats.frames_decoded);
    println!("Last frame: {}", stats.last_frame);
    if stats.loops > 0 {
        println!("Loops: {}", stats.loops);
    }
    if stats.color_uploads > 0 {
        println!("Video frames uploaded: {}", stats.color_uploads);
    }
    if stats.finished {
        println!("Reached end of vologram.");
    }
    if !stats.stalled.is_empty() {
        println!("Stalled frames: {:?}", stats.stalled);
        bail!("{} frame(s) failed to decode", stats.stalled.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vol_format::writer::write_vologram;
    use vol_format::{FrameBuilder, StreamHeader};

    fn open(count: u32, looping: bool) -> (tempfile::TempDir, Player<LatestFrameSink>) {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<FrameBuilder> = (0..count)
            .map(|i| {
                let positions = vec![[0.0, 0.0, i as f32]; 3];
                if i % 10 == 0 {
                    FrameBuilder::keyframe(positions, vec![0, 1, 2], vec![[0.0; 2]; 3])
                } else {
                    FrameBuilder::tracked(positions)
                }
            })
            .collect();
        let paths = write_vologram(dir.path(), &StreamHeader::new(12, 0), None, &frames).unwrap();
        // 32 fps keeps frame times exact in binary
        let config = PlayerConfig {
            looping,
            fallback_fps: 32.0,
            ..PlayerConfig::default()
        };
        let mut player = Player::new(config, LatestFrameSink::default());
        player.open(&paths.header, &paths.sequence).unwrap();
        (dir, player)
    }

    #[test]
    fn test_fast_host_shows_every_frame() {
        let (_dir, mut player) = open(30, false);
        player.play();
        let stats = run(&mut player, 120.0, 2.0).unwrap();
        assert!(stats.finished);
        assert_eq!(stats.advanced, 30);
        assert!(stats.stalled.is_empty());
    }

    #[test]
    fn test_slow_host_skips_frames() {
        let (_dir, mut player) = open(30, false);
        player.play();
        let stats = run(&mut player, 8.0, 0.875).unwrap();
        assert!(!stats.finished);
        assert_eq!(stats.ticks, 7);
        assert_eq!(stats.advanced, 7);
        assert_eq!(stats.frames_decoded, 9);
        assert_eq!(stats.last_frame, 28);
    }

    #[test]
    fn test_looping_run() {
        let (_dir, mut player) = open(10, true);
        player.play();
        let stats = run(&mut player, 60.0, 1.0).unwrap();
        assert!(stats.loops >= 2);
        assert!(!stats.finished);
        assert!(player.is_playing());
    }

    #[test]
    fn test_stepped_run_visits_every_frame() {
        let (_dir, mut player) = open(12, false);
        let stats = run_stepped(&mut player).unwrap();
        assert_eq!(stats.advanced, 12);
        assert_eq!(stats.last_frame, 11);
    }

    #[test]
    fn test_config_overrides() {
        let args = PlayArgs {
            vologram: VologramArgs {
                path: PathBuf::from("clip"),
                sequence: None,
            },
            fps: 60.0,
            looping: true,
            duration: None,
            preload: true,
            video: None,
        };
        let mut config = Config::default();
        config.playback.looping = false;
        config.playback.drift_threshold = 3;

        let player = player_config(&args, &config);
        assert!(player.looping);
        assert_eq!(player.read_mode, ReadMode::Preloaded);
        assert_eq!(player.drift_threshold, 3);
    }
}
