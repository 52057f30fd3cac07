//! CLI command implementations

pub mod atlas;
pub mod backends;
pub mod convert;
pub mod history;
pub mod tile;

use anyhow::{Context, Result};
use normproc_compute::{AnyPipeline, Backend, HeightImage, NormalMap, PipelineConfig, create_pipeline};
use normproc_core::Preset;
use std::path::Path;
use tracing::info;

use crate::PresetArgs;

impl PresetArgs {
    /// `base` with every option given on the command line applied.
    pub fn apply(&self, base: Preset) -> Result<Preset> {
        let mut preset = base;
        if let Some(curve) = &self.curve {
            preset.curve = curve.clone();
        }
        if let Some(s) = self.smoothness {
            preset.smoothness = s;
        }
        if let Some(i) = self.intensity {
            preset.intensity = i;
        }
        if self.tiling {
            preset.do_tiling = true;
        } else if self.no_tiling {
            preset.do_tiling = false;
        }
        if self.scharr {
            preset.use_scharr = true;
        } else if self.sobel {
            preset.use_scharr = false;
        }
        if let Some(name) = &self.name {
            preset.name = name.clone();
        }
        preset.validate().context("Invalid preset options")?;
        Ok(preset)
    }

    /// True when no option was given.
    pub fn is_empty(&self) -> bool {
        self.curve.is_none()
            && self.smoothness.is_none()
            && self.intensity.is_none()
            && !(self.tiling || self.no_tiling || self.scharr || self.sobel)
            && self.name.is_none()
    }
}

/// Load a height source
pub fn load_height(path: &Path) -> Result<HeightImage> {
    normproc_io::read_height(path)
        .with_context(|| format!("Failed to load: {}", path.display()))
}

/// Save a normal map
pub fn save_normals(path: &Path, normals: &NormalMap) -> Result<()> {
    normproc_io::write_png(path, normals)
        .with_context(|| format!("Failed to save: {}", path.display()))
}

/// Creates a pipeline with `image` bound.
pub fn open_pipeline(backend: Backend, image: &HeightImage, verbose: u8) -> Result<AnyPipeline> {
    let config = PipelineConfig::from_env().verbose(verbose > 1);
    let mut pipeline = create_pipeline(backend, config)
        .with_context(|| format!("Failed to create {} pipeline", backend.name()))?;
    info!(backend = pipeline.name(), width = image.width(), height = image.height(), "pipeline ready");
    pipeline.rebind_input(image).context("Failed to upload height image")?;
    Ok(pipeline)
}

/// One-line summary of a preset.
pub fn describe_preset(preset: &Preset) -> String {
    format!(
        "{}: smoothness {}, intensity {}, {}, {}{}",
        preset.name,
        preset.smoothness,
        preset.intensity,
        if preset.use_scharr { "scharr" } else { "sobel" },
        if preset.do_tiling { "wrap" } else { "clamp" },
        if preset.curve.is_identity() { "" } else { ", custom curve" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = PresetArgs {
            intensity: Some(4.0),
            scharr: true,
            name: Some("rock".into()),
            ..PresetArgs::default()
        };
        assert!(!args.is_empty());
        let p = args.apply(Preset::default()).unwrap();
        assert_eq!(p.intensity, 4.0);
        assert_eq!(p.smoothness, 2.0);
        assert!(p.use_scharr);
        assert_eq!(p.name, "rock");
    }

    #[test]
    fn test_apply_rejects_negative() {
        let args = PresetArgs { smoothness: Some(-1.0), ..PresetArgs::default() };
        assert!(args.apply(Preset::default()).is_err());
        assert!(PresetArgs::default().is_empty());
    }
}
