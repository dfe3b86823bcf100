//! Configuration management (`config.toml`)
//!
//! Settings are stored in TOML in the platform-specific config directory.
//! Every field has a default, so partial files load cleanly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vol_format::ReadMode;

use crate::sync::DEFAULT_DRIFT_THRESHOLD;

/// Config file name inside [`config_dir`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Playback behaviour
    #[serde(default)]
    pub playback: PlayerConfig,
    /// Companion video texture
    #[serde(default)]
    pub video: VideoConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Start playing after open and restart (default: true)
    #[serde(default = "default_true")]
    pub play_on_start: bool,
    /// Restart from frame 0 at the end instead of closing (default: true)
    #[serde(default = "default_true")]
    pub looping: bool,
    /// Keep the sequence on disk or load it into memory (default: streaming)
    #[serde(default)]
    pub read_mode: ReadMode,
    /// Frames an external clock may lead before the player skips ahead (default: 15)
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: u32,
    /// Flip video frames vertically before upload (default: true)
    #[serde(default = "default_true")]
    pub flip_video: bool,
    /// Frame rate used when neither stream nor video reports one (default: 30)
    #[serde(default = "default_fallback_fps")]
    pub fallback_fps: f32,
}

/// Raw RGB24 video texture played alongside the geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoConfig {
    /// Video file; no video is played when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Frame width in pixels (default: header texture width)
    #[serde(default)]
    pub width: u32,
    /// Frame height in pixels (default: header texture height)
    #[serde(default)]
    pub height: u32,
    /// Frames per second, 0 for the geometry rate
    #[serde(default)]
    pub frame_rate: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_true() -> bool {
    true
}
fn default_drift_threshold() -> u32 {
    DEFAULT_DRIFT_THRESHOLD
}
fn default_fallback_fps() -> f32 {
    30.0
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            play_on_start: default_true(),
            looping: default_true(),
            read_mode: ReadMode::default(),
            drift_threshold: default_drift_threshold(),
            flip_video: default_true(),
            fallback_fps: default_fallback_fps(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Errors loading or saving a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Volplay\config`
/// On macOS: `~/Library/Application Support/io.volplay.Volplay`
/// On Linux: `~/.config/volplay`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.volplay", "", "Volplay")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    let Some(path) = config_dir().map(|dir| dir.join(CONFIG_FILE_NAME)) else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            Config::default()
        }
    }
}

/// Loads the configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Saves the configuration to the platform config directory.
///
/// Creates the directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = config_dir() {
        save_to(config, &dir.join(CONFIG_FILE_NAME))?;
    }
    Ok(())
}

/// Saves the configuration to an explicit file.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
