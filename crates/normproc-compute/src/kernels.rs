//! Scalar building blocks shared by the CPU backend and the host side of
//! the GPU backend: blur weights, tile addressing and normal encoding.

use normproc_core::Rect;

/// 3x3 gradient operator used by the normal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GradientOperator {
    /// `[1, 2, 1]` smoothing, normalized by 1/8.
    #[default]
    Sobel,
    /// `[3, 10, 3]` smoothing, normalized by 1/32.
    Scharr,
}

impl GradientOperator {
    /// Operator selected by the `use_scharr` preset switch.
    #[inline]
    pub fn from_scharr(use_scharr: bool) -> Self {
        if use_scharr { Self::Scharr } else { Self::Sobel }
    }

    /// Smoothing weights across the derivative direction.
    #[inline]
    pub fn weights(self) -> [f32; 3] {
        match self {
            Self::Sobel => [1.0, 2.0, 1.0],
            Self::Scharr => [3.0, 10.0, 3.0],
        }
    }

    /// Normalization applied to the raw response.
    #[inline]
    pub fn norm(self) -> f32 {
        match self {
            Self::Sobel => 1.0 / 8.0,
            Self::Scharr => 1.0 / 32.0,
        }
    }
}

/// Below this `2 * sigma²` the neighbour weights vanish in `f32`.
const MIN_GAUSSIAN_DENOM: f32 = 1e-4;

/// Normalized 1D Gaussian weights for `sigma`.
///
/// Radius is `ceil(3 * sigma)` clamped to `max_radius`; a `sigma` too small
/// to reach a neighbour gives the identity kernel `[1.0]`.
pub fn gaussian_kernel(sigma: f32, max_radius: u32) -> Vec<f32> {
    // Tiny sigmas underflow the denominator; they are a no-op blur anyway.
    let denom = 2.0 * sigma * sigma;
    if !(denom > MIN_GAUSSIAN_DENOM) {
        return vec![1.0];
    }
    let r = ((3.0 * sigma).ceil() as u32).min(max_radius) as i32;
    if r == 0 {
        return vec![1.0];
    }
    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| {
            let x = i as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Kernel radius for a kernel of `len` taps.
#[inline]
pub fn kernel_radius(kernel: &[f32]) -> i32 {
    (kernel.len() as i32 - 1) / 2
}

/// Maps a possibly out-of-tile coordinate back into `lo..lo + len`.
///
/// With `wrap` the tile repeats; otherwise the edge pixel is held.
#[inline]
pub fn address(i: i32, lo: u32, len: u32, wrap: bool) -> usize {
    let n = len as i32;
    let j = i - lo as i32;
    let j = if wrap { j.rem_euclid(n) } else { j.clamp(0, n - 1) };
    (lo as i32 + j) as usize
}

/// Horizontal address inside `rect`.
#[inline]
pub fn address_x(x: i32, rect: &Rect, wrap: bool) -> usize {
    address(x, rect.x, rect.width, wrap)
}

/// Vertical address inside `rect`.
#[inline]
pub fn address_y(y: i32, rect: &Rect, wrap: bool) -> usize {
    address(y, rect.y, rect.height, wrap)
}

/// Normal from gradients `(gx, gy)` scaled by `intensity`.
///
/// `z = sqrt(max(0, 1 - dx² - dy²))`; steep slopes saturate at `z = 0` and
/// out-of-range xy components are clamped by [`encode_component`].
#[inline]
pub fn derive_normal(gx: f32, gy: f32, intensity: f32) -> [f32; 3] {
    let dx = -gx * intensity;
    let dy = -gy * intensity;
    let dz = (1.0 - dx * dx - dy * dy).max(0.0).sqrt();
    [dx, dy, dz]
}

/// Quantizes a `[-1, 1]` component to a byte.
#[inline]
pub fn encode_component(d: f32) -> u8 {
    ((d * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Encodes a normal as RGBA8 with opaque alpha.
#[inline]
pub fn encode_normal(n: [f32; 3]) -> [u8; 4] {
    [
        encode_component(n[0]),
        encode_component(n[1]),
        encode_component(n[2]),
        255,
    ]
}
