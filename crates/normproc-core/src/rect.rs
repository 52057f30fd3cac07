//! Pixel rectangles used to restrict stage dispatches to a tile.
//!
//! # Coordinate System
//!
//! Pipeline textures keep the host convention of a **bottom-left** origin:
//! row 0 is the bottom row of the image and Y grows upward.
//!
//! ```text
//!   Y
//!   ▲
//!   │   ┌──────────┐
//!   │   │   Tile   │
//!   │   └──────────┘
//! (0,0) ────────► X
//! ```
//!
//! # Usage
//!
//! ```rust
//! use normproc_core::Rect;
//!
//! let rect = Rect::new(0, 192, 64, 64);
//! assert_eq!(rect.right(), 64);
//! assert_eq!(rect.top(), 256);
//! assert!(rect.contains(10, 200));
//! ```

use serde::{Deserialize, Serialize};

/// A rectangle defined by origin (x, y) and dimensions (width, height).
///
/// Half-open on both axes: `x..x + width`, `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: u32,
    /// Bottom edge (inclusive).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a new rectangle.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width` x `height` texture.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Top edge (exclusive).
    #[inline]
    pub const fn top(&self) -> u32 {
        self.y + self.height
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the rectangle covers no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Checks whether a pixel lies inside the rectangle.
    #[inline]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.top()
    }

    /// Checks whether the rectangle fits inside a `width` x `height` texture.
    #[inline]
    pub const fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.top() <= height
    }

    /// Packs the rectangle as `[x, y, width, height]` for kernel uniforms.
    #[inline]
    pub const fn to_array(&self) -> [u32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(r.right(), 40);
        assert_eq!(r.top(), 60);
        assert_eq!(r.area(), 1200);
        assert!(r.contains(10, 20));
        assert!(!r.contains(40, 20));
        assert!(!r.contains(10, 60));
    }

    #[test]
    fn test_fits_within() {
        assert!(Rect::full(64, 64).fits_within(64, 64));
        assert!(!Rect::new(1, 0, 64, 64).fits_within(64, 64));
        assert!(Rect::new(0, 0, 0, 5).is_empty());
    }
}
