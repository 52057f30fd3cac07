//! Editable state of a tiled atlas: the grid, one preset per tile, the
//! active tile and the stages waiting to be recomputed.
//!
//! Consumers do not subscribe to change events. Every mutation bumps
//! [`AtlasState::version`]; a consumer remembers the last version it saw
//! and refreshes when the number moves.
//!
//! # Example
//!
//! ```rust
//! use normproc_core::{AtlasState, DirtyFlags, TileCoord, TileGrid};
//!
//! let mut atlas = AtlasState::new(TileGrid::new(2, 2).unwrap());
//! atlas.take_pending();
//!
//! let v = atlas.version();
//! atlas.edit_active(|p| p.intensity = 4.0).unwrap();
//! assert_eq!(atlas.take_pending(), DirtyFlags::NORMAL);
//! assert!(atlas.version() > v);
//! ```

use tracing::debug;

use crate::{DirtyFlags, Error, Preset, Result, TileCoord, TileGrid};

/// Grid, per-tile presets and pending recompute flags.
#[derive(Debug, Clone)]
pub struct AtlasState {
    grid: TileGrid,
    presets: Vec<Preset>,
    active: TileCoord,
    lock_params: bool,
    pending: DirtyFlags,
    version: u64,
}

impl AtlasState {
    /// State with default presets for every tile of `grid`.
    pub fn new(grid: TileGrid) -> Self {
        Self {
            grid,
            presets: vec![Preset::default(); grid.len()],
            active: TileCoord::new(0, 0),
            lock_params: false,
            pending: DirtyFlags::ALL,
            version: 0,
        }
    }

    /// Rebuilds from stored presets, e.g. a loaded sidecar.
    ///
    /// Fails when the preset count does not match the grid.
    pub fn from_presets(grid: TileGrid, presets: Vec<Preset>) -> Result<Self> {
        let mut state = Self::new(grid);
        state.replace(grid, presets)?;
        state.version = 0;
        Ok(state)
    }

    /// Current grid.
    #[inline]
    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    /// Presets in index order (`x + y * cols`).
    #[inline]
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Tile being edited.
    #[inline]
    pub fn active(&self) -> TileCoord {
        self.active
    }

    /// Monotonic change counter.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When set, every edit of the active preset is copied to all tiles.
    #[inline]
    pub fn lock_params(&self) -> bool {
        self.lock_params
    }

    /// Toggles [`AtlasState::lock_params`].
    pub fn set_lock_params(&mut self, lock: bool) {
        if self.lock_params != lock {
            self.lock_params = lock;
            self.touch();
        }
    }

    /// Preset of tile `coord`.
    pub fn preset(&self, coord: TileCoord) -> Result<&Preset> {
        let index = self.grid.index(coord)?;
        Ok(&self.presets[index])
    }

    /// Preset of the active tile.
    pub fn active_preset(&self) -> &Preset {
        // `active` is validated on every assignment and reset on resize.
        let index = self.active.x as usize + self.active.y as usize * self.grid.cols() as usize;
        &self.presets[index]
    }

    /// Selects a tile; its whole pipeline has to run again.
    pub fn set_active(&mut self, coord: TileCoord) -> Result<()> {
        self.grid.validate(coord)?;
        self.active = coord;
        self.pending = DirtyFlags::ALL;
        self.touch();
        Ok(())
    }

    /// Applies `edit` to the active preset and records the stages it dirties.
    ///
    /// The edit is rejected (state unchanged) when the result fails
    /// [`Preset::validate`].
    pub fn edit_active<F>(&mut self, edit: F) -> Result<DirtyFlags>
    where
        F: FnOnce(&mut Preset),
    {
        let before = self.active_preset().clone();
        let mut after = before.clone();
        edit(&mut after);
        after.validate()?;

        let flags = before.diff(&after);
        let index = self.grid.index(self.active)?;
        if self.lock_params {
            self.presets.fill(after);
        } else {
            self.presets[index] = after;
        }
        self.pending |= flags;
        self.touch();
        Ok(flags)
    }

    /// Replaces the preset of tile `coord`.
    pub fn set_preset(&mut self, coord: TileCoord, preset: Preset) -> Result<DirtyFlags> {
        preset.validate()?;
        let index = self.grid.index(coord)?;
        let flags = self.presets[index].diff(&preset);
        self.presets[index] = preset;
        if coord == self.active {
            self.pending |= flags;
        }
        self.touch();
        Ok(flags)
    }

    /// Copies the active preset onto tile `coord` (format painter).
    pub fn apply_active_to(&mut self, coord: TileCoord) -> Result<()> {
        let index = self.grid.index(coord)?;
        self.presets[index] = self.active_preset().clone();
        debug!(from = %self.active, to = %coord, "format painter");
        self.touch();
        Ok(())
    }

    /// Copies `preset` onto every tile.
    pub fn fill(&mut self, preset: &Preset) {
        self.presets.fill(preset.clone());
        self.pending = DirtyFlags::ALL;
        self.touch();
    }

    /// Switches to a new grid; every tile gets the default preset.
    pub fn resize(&mut self, grid: TileGrid) {
        debug!(from = %self.grid, to = %grid, "resize atlas");
        self.grid = grid;
        self.presets = vec![Preset::default(); grid.len()];
        self.active = TileCoord::new(0, 0);
        self.pending = DirtyFlags::ALL;
        self.touch();
    }

    /// Replaces grid and presets together.
    ///
    /// On a count mismatch nothing changes.
    pub fn replace(&mut self, grid: TileGrid, presets: Vec<Preset>) -> Result<()> {
        if presets.len() != grid.len() {
            return Err(Error::invalid_dimensions(
                grid.cols(),
                grid.rows(),
                format!("{} presets for {} tiles", presets.len(), grid.len()),
            ));
        }
        if let Some(bad) = presets.iter().find_map(|p| p.validate().err()) {
            return Err(bad);
        }
        self.grid = grid;
        self.presets = presets;
        if self.grid.validate(self.active).is_err() {
            self.active = TileCoord::new(0, 0);
        }
        self.pending = DirtyFlags::ALL;
        self.touch();
        Ok(())
    }

    /// Flags accumulated since the last [`AtlasState::take_pending`].
    #[inline]
    pub fn pending(&self) -> DirtyFlags {
        self.pending
    }

    /// Returns the pending flags and clears them.
    pub fn take_pending(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.pending)
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl Default for AtlasState {
    fn default() -> Self {
        Self::new(TileGrid::SINGLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(c: u32, r: u32) -> TileGrid {
        TileGrid::new(c, r).unwrap()
    }

    #[test]
    fn test_new_has_defaults() {
        let atlas = AtlasState::new(grid(3, 2));
        assert_eq!(atlas.presets().len(), 6);
        assert!(atlas.presets().iter().all(|p| *p == Preset::default()));
        assert_eq!(atlas.pending(), DirtyFlags::ALL);
    }

    #[test]
    fn test_edit_only_touches_active() {
        let mut atlas = AtlasState::new(grid(2, 2));
        atlas.set_active(TileCoord::new(1, 1)).unwrap();
        atlas.take_pending();

        let flags = atlas.edit_active(|p| p.smoothness = 0.5).unwrap();
        assert_eq!(flags, DirtyFlags::BLUR);
        assert_eq!(atlas.preset(TileCoord::new(1, 1)).unwrap().smoothness, 0.5);
        assert_eq!(atlas.preset(TileCoord::new(0, 0)).unwrap().smoothness, 2.0);
        assert_eq!(atlas.presets()[3].smoothness, 0.5);
    }

    #[test]
    fn test_invalid_edit_is_rejected() {
        let mut atlas = AtlasState::new(grid(1, 1));
        let v = atlas.version();
        assert!(atlas.edit_active(|p| p.intensity = -1.0).is_err());
        assert_eq!(atlas.active_preset().intensity, 2.0);
        assert_eq!(atlas.version(), v);
    }

    #[test]
    fn test_lock_params_fills_all() {
        let mut atlas = AtlasState::new(grid(2, 2));
        atlas.set_lock_params(true);
        atlas.edit_active(|p| p.use_scharr = true).unwrap();
        assert!(atlas.presets().iter().all(|p| p.use_scharr));
    }

    #[test]
    fn test_format_painter() {
        let mut atlas = AtlasState::new(grid(2, 1));
        atlas.edit_active(|p| p.intensity = 7.0).unwrap();
        atlas.apply_active_to(TileCoord::new(1, 0)).unwrap();
        assert_eq!(atlas.presets()[1].intensity, 7.0);
        assert!(atlas.apply_active_to(TileCoord::new(2, 0)).is_err());
    }

    #[test]
    fn test_resize_resets() {
        let mut atlas = AtlasState::new(grid(2, 2));
        atlas.set_active(TileCoord::new(1, 1)).unwrap();
        atlas.edit_active(|p| p.intensity = 9.0).unwrap();
        atlas.resize(grid(4, 1));
        assert_eq!(atlas.presets().len(), 4);
        assert_eq!(atlas.active(), TileCoord::new(0, 0));
        assert!(atlas.presets().iter().all(|p| p.intensity == 2.0));
    }

    #[test]
    fn test_replace_mismatch_keeps_state() {
        let mut atlas = AtlasState::new(grid(2, 2));
        atlas.edit_active(|p| p.intensity = 3.0).unwrap();
        let before = atlas.presets().to_vec();
        assert!(atlas.replace(grid(3, 3), vec![Preset::default(); 4]).is_err());
        assert_eq!(atlas.presets(), before.as_slice());
        assert_eq!(atlas.grid(), grid(2, 2));
    }

    #[test]
    fn test_version_increases() {
        let mut atlas = AtlasState::default();
        let v0 = atlas.version();
        atlas.fill(&Preset::named("x"));
        let v1 = atlas.version();
        assert!(v1 > v0);
        atlas.set_lock_params(false);
        assert_eq!(atlas.version(), v1);
    }
}
