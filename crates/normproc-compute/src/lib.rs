//! Tiled height-to-normal compute pipeline.
//!
//! Provides CPU (rayon) and GPU (wgpu) backends for the three pixel stages
//! (LUT remap + blur, normal derivation) and the orchestrator that runs them
//! per tile following the dirty-flag cascade.
//!
//! # Architecture
//!
//! ```text
//! NormalPipeline<G> (per-tile stage orchestration)
//!     └── GpuPrimitives trait
//!             ├── CpuPrimitives  (rayon)
//!             └── WgpuPrimitives (compute shaders, `wgpu` feature)
//! ```
//!
//! # Example
//!
//! ```
//! use normproc_compute::{CpuPrimitives, HeightImage, NormalPipeline, PipelineConfig};
//! use normproc_core::{DirtyFlags, Preset};
//!
//! let mut pipeline = NormalPipeline::new(CpuPrimitives::new(), PipelineConfig::default())?;
//! pipeline.rebind_input(&HeightImage::filled(16, 16, 0.5)?)?;
//!
//! let mut flags = DirtyFlags::ALL;
//! pipeline.recompute(&mut flags, &Preset::default())?;
//! let normals = pipeline.extract_result()?;
//! assert_eq!(normals.pixel(3, 3), [128, 128, 255, 255]);
//! # Ok::<(), normproc_compute::ComputeError>(())
//! ```

pub mod backend;
pub mod config;
pub mod image;
pub mod kernels;
pub mod pipeline;
mod shaders;

pub use backend::{
    AnyPipeline, Backend, BackendProbe, CpuImage, CpuPrimitives, GpuLimits, GpuPrimitives,
    ImageHandle, KernelVariant, TexelFormat, create_pipeline, describe_backends, probe_backends,
    select_best_backend,
};
#[cfg(feature = "wgpu")]
pub use backend::{WgpuImage, WgpuPrimitives};
pub use config::PipelineConfig;
pub use image::{HeightImage, NormalMap};
pub use kernels::GradientOperator;
pub use pipeline::NormalPipeline;

use thiserror::Error;

/// Compute errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to compile shader: {0}")]
    ShaderCompilation(String),

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Image too large: {width}x{height} exceeds limit {limit}")]
    ImageTooLarge { width: u32, height: u32, limit: u32 },

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("No input bound; call rebind_input first")]
    NoInput,

    #[error("Format mismatch: expected {expected:?}, got {actual:?}")]
    FormatMismatch { expected: TexelFormat, actual: TexelFormat },

    #[error(transparent)]
    Core(#[from] normproc_core::Error),

    #[error("GPU operation failed: {0}")]
    OperationFailed(String),
}

pub type ComputeResult<T> = Result<T, ComputeError>;
