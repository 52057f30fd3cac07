//! Recently used presets, persisted across runs.
//!
//! Stored as a JSON array at `<config dir>/normproc/history.json`, or at the
//! path named by `NORMPROC_HISTORY`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use normproc_core::{Preset, PresetHistory};
use tracing::{debug, info};

use crate::{IoError, IoResult};

/// Environment variable overriding the history location.
pub const ENV_HISTORY: &str = "NORMPROC_HISTORY";

/// Location of the history file.
pub fn history_path() -> IoResult<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_HISTORY).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("normproc").join("history.json"))
        .ok_or(IoError::NoConfigDir(ENV_HISTORY))
}

/// Loads the history at `path`.
///
/// A missing or unreadable file yields an empty history.
pub fn load_history<P: AsRef<Path>>(path: P) -> PresetHistory {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return PresetHistory::new(),
        Err(e) => {
            info!(path = %path.display(), "cannot read preset history: {e}");
            return PresetHistory::new();
        }
    };
    // Parsed as a plain list so a hand-edited file is re-capped and deduplicated.
    match serde_json::from_str::<Vec<Preset>>(&text) {
        Ok(presets) => PresetHistory::from_presets(presets),
        Err(e) => {
            info!(path = %path.display(), "discarding corrupt preset history: {e}");
            PresetHistory::new()
        }
    }
}

/// Writes `history` to `path`, creating parent directories.
pub fn save_history<P: AsRef<Path>>(path: P, history: &PresetHistory) -> IoResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(history)?)?;
    debug!(path = %path.display(), entries = history.len(), "saved preset history");
    Ok(())
}
