//! Vols CLI - inspect, validate, play and generate volograms
//!
//! # Commands
//!
//! - `vols info` - Print the header and frame directory
//! - `vols validate` - Decode every frame and report failures
//! - `vols decode` - Decode a single frame
//! - `vols play` - Run the playback scheduler headless
//! - `vols synth` - Generate a test vologram
//! - `vols config` - Show or initialize the config file
//!
//! # Usage
//!
//! ```bash
//! # Generate a vologram with a keyframe every 30 frames
//! vols synth clip --frames 90 --keyframe-interval 30
//!
//! # Inspect it (directory, header file or single file)
//! vols info clip
//! vols info clip/header.vols --json
//!
//! # Play it at 144 Hz for five seconds, looping
//! vols play clip --fps 144 --duration 5 --loop
//! ```
//!
//! Log output follows `RUST_LOG`, then `--log`, then `[logging] filter`
//! in the config file.

mod config_cmd;
mod decode;
mod info;
mod input;
mod play;
mod synth;
mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Vols CLI - inspect, validate, play and generate volograms
#[derive(Parser)]
#[command(name = "vols")]
#[command(about = "Inspect, validate, play and generate vols volograms")]
#[command(version)]
struct Cli {
    /// Log filter, e.g. "debug" or "volplay_core=trace"
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and frame directory
    Info(info::InfoArgs),

    /// Decode every frame and report failures
    Validate(validate::ValidateArgs),

    /// Decode a single frame, keyframe first when needed
    Decode(decode::DecodeArgs),

    /// Run the playback scheduler headless
    Play(play::PlayArgs),

    /// Generate a test vologram
    Synth(synth::SynthArgs),

    /// Show or initialize the config file
    Config {
        #[command(subcommand)]
        action: config_cmd::ConfigAction,
    },
}

fn init_logging(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = volplay_core::config::load();
    init_logging(cli.log.as_deref().unwrap_or(&config.logging.filter));

    match cli.command {
        Commands::Info(args) => info::execute(args),
        Commands::Validate(args) => validate::execute(args),
        Commands::Decode(args) => decode::execute(args),
        Commands::Play(args) => play::execute(args, &config),
        Commands::Synth(args) => synth::execute(args),
        Commands::Config { action } => config_cmd::execute(action, &config),
    }
}
