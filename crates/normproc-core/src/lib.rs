//! # normproc-core
//!
//! Core types for converting height images into tangent-space normal maps.
//!
//! This crate holds everything that does not touch pixels:
//!
//! - [`TileGrid`], [`TileCoord`], [`Rect`] - atlas grids and tile addressing
//! - [`ResponseCurve`], [`CurveLut`] - intensity remapping before the blur
//! - [`Preset`], [`PresetHistory`] - per-tile parameters and recent presets
//! - [`DirtyFlags`], [`Stage`] - the recompute cascade
//! - [`AtlasState`] - grid, presets and pending changes of one atlas
//!
//! ## Crate Structure
//!
//! ```text
//! normproc-core (this crate)
//!    ^
//!    |
//!    +-- normproc-compute (stage kernels, backends, pipeline)
//!    +-- normproc-io (PNG, sidecar files, history)
//!    +-- normproc-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod atlas;
pub mod curve;
pub mod dirty;
pub mod error;
pub mod grid;
pub mod lut;
pub mod preset;
pub mod rect;

// Re-exports for convenience
pub use atlas::AtlasState;
pub use curve::{Keyframe, ResponseCurve};
pub use dirty::{CASCADE, DirtyFlags, RecomputePlan, Stage};
pub use error::{Error, Result};
pub use grid::{CoverageWarning, TileCoord, TileGrid, WORKGROUP_EDGE};
pub use lut::{CurveLut, LUT_SIZE, sample_lut};
pub use preset::{DEFAULT_PRESET_NAME, HISTORY_CAPACITY, Preset, PresetHistory};
pub use rect::Rect;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use normproc_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::atlas::AtlasState;
    pub use crate::curve::ResponseCurve;
    pub use crate::dirty::{DirtyFlags, Stage};
    pub use crate::error::{Error, Result};
    pub use crate::grid::{TileCoord, TileGrid};
    pub use crate::lut::CurveLut;
    pub use crate::preset::{Preset, PresetHistory};
    pub use crate::rect::Rect;
}
