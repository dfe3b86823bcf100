//! Vologram path lookup shared by every command
//!
//! Accepts:
//! - A directory: `clip/` (uses `clip/header.vols` and `clip/sequence_0.vols`)
//! - A header file with a sibling `sequence_0.vols`
//! - A version 13 single file: `clip.vols`
//! - Any header plus an explicit `--sequence`

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::{Path, PathBuf};

use vol_format::{HEADER_FILE_NAME, ReadMode, SEQUENCE_FILE_NAME, StreamHeader, StreamReader};
use volplay_core::VologramSource;

/// Vologram location arguments
#[derive(Args, Debug, Clone)]
pub struct VologramArgs {
    /// Vologram directory, header file or single-file vologram
    pub path: PathBuf,

    /// Sequence file to pair with the header (default: sibling sequence_0.vols)
    #[arg(long)]
    pub sequence: Option<PathBuf>,
}

impl VologramArgs {
    pub fn source(&self) -> Result<VologramSource> {
        resolve_source(&self.path, self.sequence.as_deref())
    }

    /// Resolve and open a reader in `mode`.
    pub fn open(&self, mode: ReadMode) -> Result<(VologramSource, StreamReader)> {
        let source = self.source()?;
        let reader = source
            .open_reader(mode)
            .with_context(|| format!("Failed to open vologram: {}", self.path.display()))?;
        Ok((source, reader))
    }
}

/// Work out which files make up the vologram at `path`.
pub fn resolve_source(path: &Path, sequence: Option<&Path>) -> Result<VologramSource> {
    if !path.exists() {
        bail!("Vologram not found: {}", path.display());
    }

    let header = if path.is_dir() {
        path.join(HEADER_FILE_NAME)
    } else {
        path.to_path_buf()
    };

    if let Some(sequence) = sequence {
        return Ok(VologramSource::Split {
            header,
            sequence: sequence.to_path_buf(),
        });
    }

    let sibling = header
        .parent()
        .map(|dir| dir.join(SEQUENCE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(SEQUENCE_FILE_NAME));
    if sibling.exists() && sibling != header {
        return Ok(VologramSource::Split {
            header,
            sequence: sibling,
        });
    }

    let parsed = StreamHeader::from_file(&header)
        .with_context(|| format!("Failed to read header: {}", header.display()))?;
    if parsed.frame_body_start.is_none() {
        bail!(
            "{} is a version {} header but no {} was found next to it (use --sequence)",
            header.display(),
            parsed.version,
            SEQUENCE_FILE_NAME
        );
    }
    Ok(VologramSource::Single(header))
}
