//! Error types for normproc-core operations.
//!
//! Covers the configuration failures that can occur before any pixel is
//! touched: invalid grids, tile coordinates outside the grid, bad image
//! dimensions and malformed curve descriptions.
//!
//! # Usage
//!
//! ```rust
//! use normproc_core::{Error, TileGrid};
//!
//! let err = TileGrid::new(0, 4).unwrap_err();
//! assert!(matches!(err, Error::InvalidGrid { cols: 0, rows: 4 }));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by grid, curve and preset handling.
#[derive(Debug, Error)]
pub enum Error {
    /// Tile grid with a zero dimension.
    #[error("invalid tile grid {cols}x{rows}: both dimensions must be non-zero")]
    InvalidGrid {
        /// Columns requested.
        cols: u32,
        /// Rows requested.
        rows: u32,
    },

    /// Tile coordinate outside the grid.
    #[error("tile ({x}, {y}) out of range for grid {cols}x{rows}")]
    TileOutOfRange {
        /// Tile column.
        x: u32,
        /// Tile row.
        y: u32,
        /// Grid columns.
        cols: u32,
        /// Grid rows.
        rows: u32,
    },

    /// Texture smaller than the grid, or zero-sized.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Texture width.
        width: u32,
        /// Texture height.
        height: u32,
        /// Why the dimensions were rejected.
        reason: String,
    },

    /// Curve description could not be parsed or has no keys.
    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    /// Preset parameter outside its allowed range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`].
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::InvalidCurve`].
    #[inline]
    pub fn invalid_curve(msg: impl Into<String>) -> Self {
        Self::InvalidCurve(msg.into())
    }

    /// True for errors caused by grid or tile addressing.
    #[inline]
    pub fn is_grid_error(&self) -> bool {
        matches!(self, Self::InvalidGrid { .. } | Self::TileOutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TileOutOfRange { x: 4, y: 0, cols: 4, rows: 4 };
        assert!(err.to_string().contains("(4, 0)"));
        assert!(err.is_grid_error());

        let err = Error::invalid_dimensions(3, 3, "smaller than grid");
        assert!(err.to_string().contains("3x3"));
        assert!(!err.is_grid_error());
    }
}
