//! Tile grid and tile addressing for atlas textures.
//!
//! An atlas texture is split into `cols x rows` equal blocks. Each block is
//! processed with its own [`Preset`](crate::Preset) and every pipeline stage
//! restricts its dispatch to the block's pixel rectangle.
//!
//! Tile coordinates enumerate the grid the way it is displayed: `(0, 0)` is
//! the top-left cell and `y` grows downward. Textures use a bottom-left
//! origin, so the row is inverted when mapped to pixels:
//!
//! ```text
//! block  = (width / cols, height / rows)
//! offset = (x * block.w, (rows - 1 - y) * block.h)
//! ```
//!
//! # Example
//!
//! ```rust
//! use normproc_core::{Rect, TileCoord, TileGrid};
//!
//! let grid = TileGrid::new(4, 4)?;
//! let rect = grid.tile_rect(256, 256, TileCoord::new(0, 0))?;
//! assert_eq!(rect, Rect::new(0, 192, 64, 64));
//! # Ok::<(), normproc_core::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Rect, Result};

/// Edge length of a compute workgroup in pixels.
///
/// Block sizes that are not a multiple of this leave partially filled
/// workgroups at tile edges.
pub const WORKGROUP_EDGE: u32 = 8;

/// Integer tile position inside a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column, `0..cols`.
    pub x: u32,
    /// Row, `0..rows`, top row first.
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    #[inline]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Grid partitioning a texture into `cols x rows` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGrid {
    cols: u32,
    rows: u32,
}

/// Non-fatal condition detected when a grid is applied to a texture.
///
/// Processing still runs; workgroups covering the tile edge are only
/// partially used and may sample padding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageWarning {
    /// The texture does not divide evenly by the grid; trailing pixels on
    /// the right/top are never processed.
    UnevenSplit {
        /// Texture width.
        width: u32,
        /// Texture height.
        height: u32,
        /// Grid columns.
        cols: u32,
        /// Grid rows.
        rows: u32,
    },
    /// Block size is not a multiple of [`WORKGROUP_EDGE`].
    PartialWorkgroups {
        /// Block width.
        block_width: u32,
        /// Block height.
        block_height: u32,
    },
}

impl std::fmt::Display for CoverageWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnevenSplit { width, height, cols, rows } => write!(
                f,
                "texture {width}x{height} does not divide evenly into a {cols}x{rows} grid"
            ),
            Self::PartialWorkgroups { block_width, block_height } => write!(
                f,
                "tile size {block_width}x{block_height} is not a multiple of {WORKGROUP_EDGE}; \
                 make texture size / grid size a power of two"
            ),
        }
    }
}

impl TileGrid {
    /// Single tile covering the whole texture.
    pub const SINGLE: TileGrid = TileGrid { cols: 1, rows: 1 };

    /// Creates a grid, rejecting zero dimensions.
    pub fn new(cols: u32, rows: u32) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidGrid { cols, rows });
        }
        Ok(Self { cols, rows })
    }

    /// Number of columns.
    #[inline]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of rows.
    #[inline]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of tiles.
    #[inline]
    pub const fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Always false; a grid has at least one tile.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Checks that `coord` lies inside the grid.
    pub fn validate(&self, coord: TileCoord) -> Result<()> {
        if coord.x >= self.cols || coord.y >= self.rows {
            return Err(Error::TileOutOfRange {
                x: coord.x,
                y: coord.y,
                cols: self.cols,
                rows: self.rows,
            });
        }
        Ok(())
    }

    /// Linear preset index of a tile (`x + y * cols`).
    pub fn index(&self, coord: TileCoord) -> Result<usize> {
        self.validate(coord)?;
        Ok(coord.x as usize + coord.y as usize * self.cols as usize)
    }

    /// Tile coordinate for a linear preset index.
    pub fn coord(&self, index: usize) -> Option<TileCoord> {
        if index >= self.len() {
            return None;
        }
        let cols = self.cols as usize;
        Some(TileCoord::new((index % cols) as u32, (index / cols) as u32))
    }

    /// All tile coordinates in preset order (row by row, top row first).
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + use<> {
        let (cols, rows) = (self.cols, self.rows);
        (0..rows).flat_map(move |y| (0..cols).map(move |x| TileCoord::new(x, y)))
    }

    /// Pixel size of one tile for a `width` x `height` texture.
    pub fn block_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let bw = width / self.cols;
        let bh = height / self.rows;
        if bw == 0 || bh == 0 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("smaller than {}x{} grid", self.cols, self.rows),
            ));
        }
        Ok((bw, bh))
    }

    /// Maps a tile coordinate to its pixel rectangle (bottom-left origin).
    ///
    /// Pure and deterministic.
    pub fn tile_rect(&self, width: u32, height: u32, coord: TileCoord) -> Result<Rect> {
        self.validate(coord)?;
        let (bw, bh) = self.block_size(width, height)?;
        Ok(Rect::new(
            coord.x * bw,
            (self.rows - 1 - coord.y) * bh,
            bw,
            bh,
        ))
    }

    /// Normalized `(u, v, w, h)` preview rectangle of a tile, bottom-left origin.
    pub fn preview_uv(&self, coord: TileCoord) -> [f32; 4] {
        let cols = self.cols as f32;
        let rows = self.rows as f32;
        [
            coord.x as f32 / cols,
            1.0 - (coord.y as f32 + 1.0) / rows,
            1.0 / cols,
            1.0 / rows,
        ]
    }

    /// Detects grid/texture combinations that leave partial workgroups.
    pub fn coverage(&self, width: u32, height: u32) -> Option<CoverageWarning> {
        if width % self.cols != 0 || height % self.rows != 0 {
            return Some(CoverageWarning::UnevenSplit {
                width,
                height,
                cols: self.cols,
                rows: self.rows,
            });
        }
        let bw = width / self.cols;
        let bh = height / self.rows;
        if bw % WORKGROUP_EDGE != 0 || bh % WORKGROUP_EDGE != 0 {
            return Some(CoverageWarning::PartialWorkgroups {
                block_width: bw,
                block_height: bh,
            });
        }
        None
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl std::fmt::Display for TileGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl std::str::FromStr for TileGrid {
    type Err = Error;

    /// Parses `"CxR"`, e.g. `"4x4"`.
    fn from_str(s: &str) -> Result<Self> {
        let (c, r) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::invalid_dimensions(0, 0, format!("expected CxR, got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| Error::invalid_dimensions(0, 0, format!("bad grid size '{s}'")))
        };
        TileGrid::new(parse(c)?, parse(r)?)
    }
}

impl std::str::FromStr for TileCoord {
    type Err = Error;

    /// Parses `"X,Y"`, e.g. `"1,2"`.
    fn from_str(s: &str) -> Result<Self> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| Error::invalid_dimensions(0, 0, format!("expected X,Y, got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| Error::invalid_dimensions(0, 0, format!("bad tile coordinate '{s}'")))
        };
        Ok(TileCoord::new(parse(x)?, parse(y)?))
    }
}
