//! Per-tile processing parameters and the recent-preset history.
//!
//! A [`Preset`] is a plain value: copying one tile's preset to another
//! (format painting, locked parameters) clones it. Parameter edits are
//! translated into [`DirtyFlags`] with [`Preset::diff`].
//!
//! # Example
//!
//! ```rust
//! use normproc_core::{DirtyFlags, Preset};
//!
//! let a = Preset::default();
//! let mut b = a.clone();
//! b.use_scharr = true;
//! assert_eq!(a.diff(&b), DirtyFlags::KEYWORD);
//! ```

use serde::{Deserialize, Serialize};

use crate::{DirtyFlags, Error, ResponseCurve, Result};

/// Name given to presets created by a grid resize.
pub const DEFAULT_PRESET_NAME: &str = "Default Preset";

/// Maximum number of entries kept by [`PresetHistory`].
pub const HISTORY_CAPACITY: usize = 5;

/// Processing parameters for one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preset {
    /// Remaps input intensity before blurring.
    #[serde(rename = "bwCurve")]
    pub curve: ResponseCurve,
    /// Gaussian sigma in pixels.
    pub smoothness: f32,
    /// Gradient scale.
    pub intensity: f32,
    /// Wrap samples around the tile edges.
    pub do_tiling: bool,
    /// Scharr instead of Sobel gradient.
    pub use_scharr: bool,
    /// Display name.
    pub name: String,
}

impl Preset {
    /// Default parameters with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Checks numeric parameters: smoothness and intensity must be finite and >= 0.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("smoothness", self.smoothness), ("intensity", self.intensity)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Stages invalidated by switching from `self` to `other`.
    ///
    /// The name is metadata and never dirties a stage.
    pub fn diff(&self, other: &Preset) -> DirtyFlags {
        let mut flags = DirtyFlags::NONE;
        if self.do_tiling != other.do_tiling || self.use_scharr != other.use_scharr {
            flags |= DirtyFlags::KEYWORD;
        }
        if self.curve != other.curve {
            flags |= DirtyFlags::LUT;
        }
        if self.smoothness != other.smoothness {
            flags |= DirtyFlags::BLUR;
        }
        if self.intensity != other.intensity {
            flags |= DirtyFlags::NORMAL;
        }
        flags
    }

    /// True when both presets produce the same pixels.
    pub fn same_parameters(&self, other: &Preset) -> bool {
        self.diff(other).is_empty()
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            curve: ResponseCurve::default(),
            smoothness: 2.0,
            intensity: 2.0,
            do_tiling: false,
            use_scharr: false,
            name: DEFAULT_PRESET_NAME.to_string(),
        }
    }
}

/// Most-recent-first list of presets, capped at [`HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetHistory {
    presets: Vec<Preset>,
}

impl PresetHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from stored entries, dropping duplicates and overflow.
    pub fn from_presets(presets: impl IntoIterator<Item = Preset>) -> Self {
        let mut history = Self::new();
        for preset in presets {
            if history.presets.len() >= HISTORY_CAPACITY {
                break;
            }
            if !history.presets.contains(&preset) {
                history.presets.push(preset);
            }
        }
        history
    }

    /// Puts `preset` at the front.
    ///
    /// An equal entry already present is moved instead of duplicated; the
    /// oldest entry falls off once the list exceeds capacity.
    pub fn add(&mut self, preset: Preset) {
        self.presets.retain(|p| *p != preset);
        self.presets.insert(0, preset);
        self.presets.truncate(HISTORY_CAPACITY);
    }

    /// Moves entry `index` to the front and returns it.
    pub fn select(&mut self, index: usize) -> Option<&Preset> {
        if index >= self.presets.len() {
            return None;
        }
        let preset = self.presets.remove(index);
        self.presets.insert(0, preset);
        self.presets.first()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.presets.clear();
    }

    /// Entry at `index`, 0 being the most recent.
    pub fn get(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// True when no preset was recorded.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Entries, most recent first.
    pub fn iter(&self) -> std::slice::Iter<'_, Preset> {
        self.presets.iter()
    }
}

impl<'a> IntoIterator for &'a PresetHistory {
    type Item = &'a Preset;
    type IntoIter = std::slice::Iter<'a, Preset>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_intensity(v: f32) -> Preset {
        Preset {
            intensity: v,
            name: format!("i{v}"),
            ..Preset::default()
        }
    }

    #[test]
    fn test_defaults() {
        let p = Preset::default();
        assert!(p.curve.is_identity());
        assert_eq!(p.smoothness, 2.0);
        assert_eq!(p.intensity, 2.0);
        assert!(!p.do_tiling && !p.use_scharr);
        assert_eq!(p.name, DEFAULT_PRESET_NAME);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative() {
        let p = Preset { smoothness: -1.0, ..Preset::default() };
        assert!(matches!(p.validate(), Err(Error::InvalidParameter { name: "smoothness", .. })));
        let p = Preset { intensity: f32::NAN, ..Preset::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_diff_maps_parameters_to_stages() {
        let base = Preset::default();
        let mut p = base.clone();
        p.curve = ResponseCurve::linear(0.0, 1.0, 1.0, 0.0);
        assert_eq!(base.diff(&p), DirtyFlags::LUT);

        let p = Preset { smoothness: 0.0, ..base.clone() };
        assert_eq!(base.diff(&p), DirtyFlags::BLUR);

        let p = Preset { intensity: 5.0, do_tiling: true, ..base.clone() };
        assert_eq!(base.diff(&p), DirtyFlags::NORMAL | DirtyFlags::KEYWORD);

        let p = Preset::named("renamed");
        assert!(base.diff(&p).is_empty());
        assert!(base.same_parameters(&p));
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_string(&Preset::default()).unwrap();
        assert!(json.contains("\"bwCurve\""));
        assert!(json.contains("\"doTiling\""));
        assert!(json.contains("\"useScharr\""));
        let back: Preset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Preset::default());
    }

    #[test]
    fn test_history_move_to_front_and_cap() {
        let mut h = PresetHistory::new();
        for i in 0..7 {
            h.add(with_intensity(i as f32));
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert_eq!(h.get(0).unwrap().intensity, 6.0);
        assert_eq!(h.get(4).unwrap().intensity, 2.0);

        h.add(with_intensity(4.0));
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert_eq!(h.get(0).unwrap().intensity, 4.0);
        assert_eq!(h.iter().filter(|p| p.intensity == 4.0).count(), 1);
    }

    #[test]
    fn test_history_select() {
        let mut h = PresetHistory::from_presets([with_intensity(1.0), with_intensity(2.0)]);
        assert_eq!(h.select(1).unwrap().intensity, 2.0);
        assert_eq!(h.get(1).unwrap().intensity, 1.0);
        assert!(h.select(9).is_none());
        h.clear();
        assert!(h.is_empty());
    }
}
