//! Host-side images exchanged with the pipeline.
//!
//! Both types store rows top-down, the way image files do. The pipeline
//! flips rows on upload and readback because its buffers are bottom-up.

use crate::{ComputeError, ComputeResult};

/// Single-channel height field.
#[derive(Clone, PartialEq)]
pub struct HeightImage {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl HeightImage {
    /// Wraps `data` (row-major, top row first).
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> ComputeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Image with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> ComputeResult<Self> {
        Self::new(vec![value; (width as usize) * (height as usize)], width, height)
    }

    /// Image built from a per-pixel function of `(x, y)`, `y = 0` at the top.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> ComputeResult<Self> {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self::new(data, width, height)
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel values, top row first.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value at `(x, y)`, `y = 0` at the top.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }
}

impl std::fmt::Debug for HeightImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// RGBA8 tangent-space normal map.
#[derive(Clone, PartialEq)]
pub struct NormalMap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl NormalMap {
    /// Wraps interleaved RGBA bytes (top row first).
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> ComputeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA of pixel `(x, y)`, `y = 0` at the top.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Interleaved RGBA bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for NormalMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Reverses row order of a row-major buffer in place.
pub(crate) fn flip_rows<T>(data: &mut [T], row_len: usize) {
    if row_len == 0 {
        return;
    }
    let rows = data.len() / row_len;
    for y in 0..rows / 2 {
        let (top, bottom) = data.split_at_mut((rows - 1 - y) * row_len);
        top[y * row_len..(y + 1) * row_len].swap_with_slice(&mut bottom[..row_len]);
    }
}
