//! Per-image preset files.
//!
//! An atlas stores its grid and per-tile presets next to the source image as
//! `<source>.normproc`:
//!
//! ```json
//! { "Size": { "x": 2, "y": 2 }, "presets": [ ... ] }
//! ```
//!
//! Presets are listed in tile index order (`x + y * cols`).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use normproc_core::{AtlasState, Preset, TileGrid};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{IoError, IoResult};

/// Extension appended to the source path.
pub const SIDECAR_EXTENSION: &str = "normproc";

/// Grid size as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    /// Columns.
    pub x: u32,
    /// Rows.
    pub y: u32,
}

/// On-disk sidecar content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    /// Grid size.
    #[serde(rename = "Size")]
    pub size: GridSize,
    /// One preset per tile.
    pub presets: Vec<Preset>,
}

impl Sidecar {
    /// Snapshot of an atlas.
    pub fn from_atlas(atlas: &AtlasState) -> Self {
        let grid = atlas.grid();
        Self {
            size: GridSize { x: grid.cols(), y: grid.rows() },
            presets: atlas.presets().to_vec(),
        }
    }

    /// Checks size and preset count and returns the grid.
    pub fn validate(&self) -> IoResult<TileGrid> {
        let grid = TileGrid::new(self.size.x, self.size.y)
            .map_err(|e| IoError::InvalidSidecar(e.to_string()))?;
        if self.presets.len() != grid.len() {
            return Err(IoError::InvalidSidecar(format!(
                "{} presets for a {grid} grid",
                self.presets.len()
            )));
        }
        if let Some(err) = self.presets.iter().find_map(|p| p.validate().err()) {
            return Err(IoError::InvalidSidecar(err.to_string()));
        }
        Ok(grid)
    }
}

/// `<source>.normproc`.
pub fn sidecar_path<P: AsRef<Path>>(source: P) -> PathBuf {
    let mut name = source.as_ref().as_os_str().to_owned();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// Parses and validates a sidecar file.
pub fn read_sidecar<P: AsRef<Path>>(path: P) -> IoResult<Sidecar> {
    let text = fs::read_to_string(path)?;
    let sidecar: Sidecar = serde_json::from_str(&text)?;
    sidecar.validate()?;
    Ok(sidecar)
}

/// Writes the atlas grid and presets next to `source`.
pub fn save_sidecar<P: AsRef<Path>>(source: P, atlas: &AtlasState) -> IoResult<PathBuf> {
    let path = sidecar_path(source);
    let json = serde_json::to_string_pretty(&Sidecar::from_atlas(atlas))?;
    fs::write(&path, json)?;
    debug!(path = %path.display(), grid = %atlas.grid(), "saved presets");
    Ok(path)
}

/// Loads the sidecar of `source` into `atlas`.
///
/// Returns `Ok(true)` when grid and presets were replaced. A missing,
/// unparsable or inconsistent file leaves `atlas` unchanged and returns
/// `Ok(false)`; only filesystem errors other than "not found" fail.
pub fn load_sidecar<P: AsRef<Path>>(source: P, atlas: &mut AtlasState) -> IoResult<bool> {
    let path = sidecar_path(source);
    let sidecar = match read_sidecar(&path) {
        Ok(s) => s,
        Err(IoError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no preset file");
            return Ok(false);
        }
        Err(IoError::Io(e)) => return Err(e.into()),
        Err(e) => {
            info!(path = %path.display(), "ignoring preset file: {e}");
            return Ok(false);
        }
    };

    let grid = sidecar.validate()?;
    atlas.replace(grid, sidecar.presets)?;
    debug!(path = %path.display(), %grid, "loaded presets");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(sidecar_path("a/rock.png"), PathBuf::from("a/rock.png.normproc"));
    }

    #[test]
    fn test_json_layout() {
        let atlas = AtlasState::new(TileGrid::new(2, 1).unwrap());
        let value = serde_json::to_value(Sidecar::from_atlas(&atlas)).unwrap();
        assert_eq!(value["Size"]["x"], 2);
        assert_eq!(value["Size"]["y"], 1);
        assert_eq!(value["presets"].as_array().unwrap().len(), 2);
        assert_eq!(value["presets"][0]["name"], "Default Preset");
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let s = Sidecar { size: GridSize { x: 0, y: 1 }, presets: vec![] };
        assert!(matches!(s.validate(), Err(IoError::InvalidSidecar(_))));
    }
}
