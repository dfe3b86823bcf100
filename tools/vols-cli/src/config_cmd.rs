//! Config command - show, locate or initialize `config.toml`

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::PathBuf;

use volplay_core::config::{self, CONFIG_FILE_NAME, Config};

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config file location
    Path,

    /// Write a config file with default values
    Init {
        /// Write here instead of the platform config directory
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn default_path() -> Result<PathBuf> {
    config::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .context("Could not determine the config directory")
}

/// Execute a config action
pub fn execute(action: ConfigAction, current: &Config) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let text = toml::to_string_pretty(current).context("Failed to serialize config")?;
            print!("{}", text);
        }
        ConfigAction::Path => {
            println!("{}", default_path()?.display());
        }
        ConfigAction::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => default_path()?,
            };
            init(&path, force)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn init(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_to(&Config::default(), path)
        .with_context(|| format!("Failed to write {}", path.display()))
}
