//! Lookup table sampled from a [`ResponseCurve`].
//!
//! The table holds [`LUT_SIZE`] samples of the curve at evenly spaced
//! positions over `[0, 1]` (both ends included). Stages read the table
//! instead of evaluating the curve per pixel.

use crate::ResponseCurve;

/// Number of samples in a [`CurveLut`].
pub const LUT_SIZE: usize = 256;

/// Sampled response curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveLut {
    entries: Vec<f32>,
}

impl CurveLut {
    /// Samples `curve` at `i / (LUT_SIZE - 1)` for every entry.
    ///
    /// Output is not clamped; a curve with values outside `[0, 1]` produces
    /// a table with values outside `[0, 1]`.
    pub fn compute(curve: &ResponseCurve) -> Self {
        let scale = (LUT_SIZE - 1) as f32;
        let entries = (0..LUT_SIZE)
            .map(|i| curve.evaluate(i as f32 / scale))
            .collect();
        Self { entries }
    }

    /// Identity table (`entry[i] = i / (N - 1)`).
    pub fn identity() -> Self {
        Self::compute(&ResponseCurve::default())
    }

    /// Raw entries, suitable for upload to a storage buffer.
    #[inline]
    pub fn entries(&self) -> &[f32] {
        &self.entries
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for tables built by [`CurveLut::compute`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up `v` with linear interpolation between entries.
    ///
    /// `v` is clamped to `[0, 1]` first.
    #[inline]
    pub fn sample(&self, v: f32) -> f32 {
        sample_lut(&self.entries, v)
    }
}

impl Default for CurveLut {
    fn default() -> Self {
        Self::identity()
    }
}

/// Linear lookup into a 1D table over `[0, 1]`.
///
/// Shared by the CPU kernels so that the same arithmetic is used everywhere.
#[inline]
pub fn sample_lut(lut: &[f32], v: f32) -> f32 {
    let n = lut.len();
    if n == 0 {
        return v;
    }
    let scale = (n - 1) as f32;
    let x = v.clamp(0.0, 1.0) * scale;
    let i0 = (x as usize).min(n - 1);
    let i1 = (i0 + 1).min(n - 1);
    let f = x - i0 as f32;
    lut[i0] + f * (lut[i1] - lut[i0])
}
