//! GPU primitives abstraction shared by every backend.

use normproc_core::Rect;

use super::GpuLimits;
use crate::kernels::GradientOperator;
use crate::ComputeResult;

/// Texel layout of a pipeline buffer. Both layouts use four bytes per texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    /// One `f32` per texel (input, scratch, intermediate).
    R32Float,
    /// Packed RGBA8 per texel (normal output).
    Rgba8,
}

/// Handle to an image in GPU memory.
pub trait ImageHandle: Send + Sync {
    /// Image dimensions (width, height, format).
    fn dimensions(&self) -> (u32, u32, TexelFormat);

    /// Width.
    fn width(&self) -> u32 { self.dimensions().0 }

    /// Height.
    fn height(&self) -> u32 { self.dimensions().1 }

    /// Texel layout.
    fn format(&self) -> TexelFormat { self.dimensions().2 }

    /// Size in bytes of GPU memory used.
    fn size_bytes(&self) -> u64 {
        let (w, h, _) = self.dimensions();
        (w as u64) * (h as u64) * 4
    }
}

/// Kernel options chosen by the keyword stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KernelVariant {
    /// Wrap samples around the tile instead of clamping.
    pub tiling: bool,
    /// Gradient operator of the normal stage.
    pub operator: GradientOperator,
}

impl KernelVariant {
    /// Variant for the preset switches `do_tiling` / `use_scharr`.
    pub fn new(tiling: bool, use_scharr: bool) -> Self {
        Self {
            tiling,
            operator: GradientOperator::from_scharr(use_scharr),
        }
    }

    /// True when the Scharr operator is selected.
    #[inline]
    pub fn use_scharr(&self) -> bool {
        self.operator == GradientOperator::Scharr
    }
}

impl std::fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            if self.tiling { "tiled" } else { "clamped" },
            if self.use_scharr() { "+scharr" } else { "+sobel" }
        )
    }
}

/// Core stage operations every backend provides.
///
/// All `exec_*` calls read and write only inside `rect` (bottom-left
/// origin); texels outside it keep their previous contents. Calls return
/// after the work has completed.
pub trait GpuPrimitives: Send + Sync {
    /// Backend-specific image handle type.
    type Handle: ImageHandle;

    /// Upload `f32` texels into a new `R32Float` image.
    fn upload(&self, data: &[f32], width: u32, height: u32) -> ComputeResult<Self::Handle>;

    /// Overwrite an existing `R32Float` image without reallocating.
    fn write(&self, handle: &mut Self::Handle, data: &[f32]) -> ComputeResult<()>;

    /// Download `R32Float` texels.
    fn download(&self, handle: &Self::Handle) -> ComputeResult<Vec<f32>>;

    /// Download `Rgba8` texels as interleaved bytes.
    fn download_rgba8(&self, handle: &Self::Handle) -> ComputeResult<Vec<u8>>;

    /// Allocate a zero-initialized image.
    fn allocate(&self, width: u32, height: u32, format: TexelFormat) -> ComputeResult<Self::Handle>;

    /// Build whatever `variant` needs before it is executed.
    ///
    /// Shader compilation failures surface here.
    fn prepare_variant(&mut self, variant: KernelVariant) -> ComputeResult<()>;

    /// Horizontal pass: LUT remap then blur along x, `src -> dst`.
    fn exec_blur_h(&self, src: &Self::Handle, dst: &mut Self::Handle, lut: &[f32],
                   kernel: &[f32], rect: Rect, variant: KernelVariant) -> ComputeResult<()>;

    /// Vertical pass: blur along y, `src -> dst`.
    fn exec_blur_v(&self, src: &Self::Handle, dst: &mut Self::Handle,
                   kernel: &[f32], rect: Rect, variant: KernelVariant) -> ComputeResult<()>;

    /// Gradient to encoded normal, `R32Float src -> Rgba8 dst`.
    fn exec_normal(&self, src: &Self::Handle, dst: &mut Self::Handle,
                   intensity: f32, rect: Rect, variant: KernelVariant) -> ComputeResult<()>;

    /// Get GPU limits.
    fn limits(&self) -> &GpuLimits;

    /// Backend name.
    fn name(&self) -> &'static str;
}
