//! Compute backends for the stage kernels.
//!
//! Provides CPU (rayon) and wgpu backends with automatic selection.
//!
//! # Architecture
//!
//! ```text
//! NormalPipeline<G: GpuPrimitives>
//!     +-- CpuPrimitives  (rayon parallelization)
//!     +-- WgpuPrimitives (Vulkan/Metal/DX12)
//! ```

mod cpu_backend;
mod detect;
mod gpu_primitives;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

// Core types
pub use detect::{BackendProbe, describe_backends, probe_backends, select_best_backend};
pub use gpu_primitives::{GpuPrimitives, ImageHandle, KernelVariant, TexelFormat};

// Backends
pub use cpu_backend::{CpuImage, CpuPrimitives};

#[cfg(feature = "wgpu")]
pub use wgpu_backend::{WgpuImage, WgpuPrimitives};

use normproc_core::{DirtyFlags, Preset, Rect, TileCoord, TileGrid, CoverageWarning};

use crate::config::PipelineConfig;
use crate::image::{HeightImage, NormalMap};
use crate::pipeline::NormalPipeline;
use crate::{ComputeError, ComputeResult};

/// Resource limits of a backend.
#[derive(Debug, Clone)]
pub struct GpuLimits {
    /// Maximum texture dimension (width or height).
    pub max_tile_dim: u32,
    /// Maximum buffer size in bytes.
    pub max_buffer_bytes: u64,
}

impl GpuLimits {
    /// Checks that a `width` x `height` single-plane image fits.
    pub fn check(&self, width: u32, height: u32) -> ComputeResult<()> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        let bytes = (width as u64) * (height as u64) * 4;
        if width > self.max_tile_dim || height > self.max_tile_dim || bytes > self.max_buffer_bytes {
            return Err(ComputeError::ImageTooLarge { width, height, limit: self.max_tile_dim });
        }
        Ok(())
    }
}

/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (wgpu > CPU).
    #[default]
    Auto,
    /// CPU backend using rayon for parallelization.
    Cpu,
    /// wgpu backend (Vulkan/Metal/DX12).
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuPrimitives::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = ComputeError;

    fn from_str(s: &str) -> ComputeResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            other => Err(ComputeError::BackendNotAvailable(format!("unknown backend '{other}'"))),
        }
    }
}

/// Pipeline over any backend, for callers choosing the backend at runtime.
pub enum AnyPipeline {
    Cpu(NormalPipeline<CpuPrimitives>),
    #[cfg(feature = "wgpu")]
    Wgpu(NormalPipeline<WgpuPrimitives>),
}

impl AnyPipeline {
    /// Get backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu(p) => p.backend_name(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.backend_name(),
        }
    }

    /// See [`NormalPipeline::rebind_input`].
    pub fn rebind_input(&mut self, image: &HeightImage) -> ComputeResult<()> {
        match self {
            Self::Cpu(p) => p.rebind_input(image),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.rebind_input(image),
        }
    }

    /// See [`NormalPipeline::set_tile`].
    pub fn set_tile(&mut self, grid: TileGrid, coord: TileCoord) -> ComputeResult<Option<CoverageWarning>> {
        match self {
            Self::Cpu(p) => p.set_tile(grid, coord),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.set_tile(grid, coord),
        }
    }

    /// See [`NormalPipeline::recompute`].
    pub fn recompute(&mut self, flags: &mut DirtyFlags, preset: &Preset) -> ComputeResult<Rect> {
        match self {
            Self::Cpu(p) => p.recompute(flags, preset),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.recompute(flags, preset),
        }
    }

    /// See [`NormalPipeline::recompute_all`].
    pub fn recompute_all(&mut self, grid: TileGrid, presets: &[Preset], flags: &mut DirtyFlags) -> ComputeResult<()> {
        match self {
            Self::Cpu(p) => p.recompute_all(grid, presets, flags),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.recompute_all(grid, presets, flags),
        }
    }

    /// See [`NormalPipeline::extract_result`].
    pub fn extract_result(&self) -> ComputeResult<NormalMap> {
        match self {
            Self::Cpu(p) => p.extract_result(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.extract_result(),
        }
    }

    /// See [`NormalPipeline::extract_intermediate`].
    pub fn extract_intermediate(&self) -> ComputeResult<HeightImage> {
        match self {
            Self::Cpu(p) => p.extract_intermediate(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(p) => p.extract_intermediate(),
        }
    }
}

/// Create a pipeline on the requested backend.
pub fn create_pipeline(backend: Backend, config: PipelineConfig) -> ComputeResult<AnyPipeline> {
    match backend {
        Backend::Auto => create_pipeline(select_best_backend(), config),
        Backend::Cpu => Ok(AnyPipeline::Cpu(NormalPipeline::new(CpuPrimitives::new(), config)?)),
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                let gpu = WgpuPrimitives::with_workgroup(config.workgroup_size)?;
                Ok(AnyPipeline::Wgpu(NormalPipeline::new(gpu, config)?))
            }
            #[cfg(not(feature = "wgpu"))]
            {
                let _ = config;
                Err(ComputeError::BackendNotAvailable(
                    "wgpu feature not enabled".to_string()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("CPU".parse::<Backend>().unwrap(), Backend::Cpu);
        assert_eq!("gpu".parse::<Backend>().unwrap(), Backend::Wgpu);
        assert!("cuda".parse::<Backend>().is_err());
    }

    #[test]
    fn test_limits_check() {
        let limits = GpuLimits { max_tile_dim: 64, max_buffer_bytes: 64 * 64 * 4 };
        assert!(limits.check(64, 64).is_ok());
        assert!(matches!(limits.check(65, 1), Err(ComputeError::ImageTooLarge { .. })));
        assert!(matches!(limits.check(0, 1), Err(ComputeError::InvalidDimensions(0, 1))));
    }

    #[test]
    fn test_create_cpu_pipeline() {
        let p = create_pipeline(Backend::Cpu, PipelineConfig::default()).unwrap();
        assert_eq!(p.name(), "CPU");
    }
}
