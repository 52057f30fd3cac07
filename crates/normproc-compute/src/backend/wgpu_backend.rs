//! wgpu backend implementation.
//!
//! Stage kernels run as compute shaders over the active tile. Each kernel
//! variant gets its own set of pipelines, compiled on first use and cached.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::util::DeviceExt;

use normproc_core::{Rect, WORKGROUP_EDGE};

use super::GpuLimits;
use super::gpu_primitives::{GpuPrimitives, ImageHandle, KernelVariant, TexelFormat};
use crate::kernels::kernel_radius;
use crate::shaders::{self, StageProgram};
use crate::{ComputeError, ComputeResult};

// =============================================================================
// Uniform Buffers
// =============================================================================

/// Stage uniform: texture size, tile rect and scalar parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct StageUniform {
    /// width, height, kernel radius, lut length
    dims: [u32; 4],
    /// x, y, w, h
    rect: [u32; 4],
    /// intensity, 0, 0, 0
    params: [f32; 4],
}

// =============================================================================
// WgpuImage Handle
// =============================================================================

/// GPU buffer handle for image data.
pub struct WgpuImage {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    format: TexelFormat,
    size_bytes: u64,
}

impl ImageHandle for WgpuImage {
    fn dimensions(&self) -> (u32, u32, TexelFormat) {
        (self.width, self.height, self.format)
    }

    fn size_bytes(&self) -> u64 { self.size_bytes }
}

// =============================================================================
// Pipelines
// =============================================================================

struct Pipelines {
    blur_h: wgpu::ComputePipeline,
    blur_v: wgpu::ComputePipeline,
    normal: wgpu::ComputePipeline,
}

// =============================================================================
// WgpuPrimitives
// =============================================================================

/// wgpu GPU primitives implementation.
pub struct WgpuPrimitives {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    variants: HashMap<KernelVariant, Pipelines>,
    workgroup: u32,
    limits: GpuLimits,
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

fn adapter_options() -> wgpu::RequestAdapterOptions<'static, 'static> {
    wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }
}

impl WgpuPrimitives {
    /// Adapter the device would be created on, if any.
    pub fn probe_adapter() -> Option<wgpu::AdapterInfo> {
        pollster::block_on(async { instance().request_adapter(&adapter_options()).await })
            .map(|adapter| adapter.get_info())
    }

    /// Check if wgpu is available.
    pub fn is_available() -> bool {
        Self::probe_adapter().is_some()
    }

    /// Create new wgpu primitives with 8x8 workgroups.
    pub fn new() -> ComputeResult<Self> {
        Self::with_workgroup(WORKGROUP_EDGE)
    }

    /// Create new wgpu primitives with `workgroup` x `workgroup` dispatches.
    pub fn with_workgroup(workgroup: u32) -> ComputeResult<Self> {
        pollster::block_on(Self::new_async(workgroup))
    }

    /// Create new wgpu primitives asynchronously.
    pub async fn new_async(workgroup: u32) -> ComputeResult<Self> {
        let adapter = instance()
            .request_adapter(&adapter_options())
            .await
            .ok_or(ComputeError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("normproc_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
            }, None)
            .await
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        let info = adapter.get_info();
        debug!(adapter = %info.name, backend = ?info.backend, "wgpu device created");

        let limits = GpuLimits {
            max_tile_dim: adapter_limits.max_texture_dimension_2d,
            max_buffer_bytes: adapter_limits.max_storage_buffer_binding_size as u64,
        };

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            variants: HashMap::new(),
            workgroup: workgroup.max(1),
            limits,
        })
    }

    fn create_pipelines(&self, variant: KernelVariant) -> ComputeResult<Pipelines> {
        let create_pipeline = |program: StageProgram| -> ComputeResult<wgpu::ComputePipeline> {
            let source = shaders::variant_source(program, variant.tiling, variant.use_scharr(), self.workgroup);
            let label = format!("{}_{}", program.label(), variant);

            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&label),
                layout: None, // Auto layout
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
            if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
                return Err(ComputeError::ShaderCompilation(format!("{label}: {err}")));
            }
            Ok(pipeline)
        };

        Ok(Pipelines {
            blur_h: create_pipeline(StageProgram::BlurH)?,
            blur_v: create_pipeline(StageProgram::BlurV)?,
            normal: create_pipeline(StageProgram::Normal)?,
        })
    }

    fn pipelines(&self, variant: KernelVariant) -> ComputeResult<&Pipelines> {
        self.variants
            .get(&variant)
            .ok_or_else(|| ComputeError::OperationFailed(format!("kernel variant {variant} not prepared")))
    }

    /// Create stage uniform buffer.
    fn create_stage_buffer(&self, handle: &WgpuImage, rect: Rect, radius: u32, lut_len: u32, intensity: f32) -> wgpu::Buffer {
        let uniform = StageUniform {
            dims: [handle.width, handle.height, radius, lut_len],
            rect: rect.to_array(),
            params: [intensity, 0.0, 0.0, 0.0],
        };
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stage_uniform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    fn create_storage(&self, label: &str, data: &[f32]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE,
        })
    }

    /// Workgroup counts covering `rect`.
    fn workgroups(&self, rect: &Rect) -> (u32, u32, u32) {
        (rect.width.div_ceil(self.workgroup), rect.height.div_ceil(self.workgroup), 1)
    }

    /// Execute compute dispatch and wait.
    fn dispatch_and_wait(&self, pipeline: &wgpu::ComputePipeline, bind_group: &wgpu::BindGroup, workgroups: (u32, u32, u32)) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compute_encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    fn read_back(&self, handle: &WgpuImage) -> ComputeResult<Vec<u8>> {
        let size = handle.size_bytes;

        // Create staging buffer
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        // Copy to staging
        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&handle.buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        // Map and read
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| { let _ = tx.send(r); });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| ComputeError::OperationFailed("Map channel closed".into()))?
            .map_err(|e| ComputeError::OperationFailed(format!("Map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result = data.to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }
}

fn expect_format(handle: &WgpuImage, expected: TexelFormat) -> ComputeResult<()> {
    if handle.format != expected {
        return Err(ComputeError::FormatMismatch { expected, actual: handle.format });
    }
    Ok(())
}

fn check_rect(handle: &WgpuImage, rect: &Rect) -> ComputeResult<()> {
    if rect.is_empty() || !rect.fits_within(handle.width, handle.height) {
        return Err(ComputeError::Core(normproc_core::Error::invalid_dimensions(
            handle.width,
            handle.height,
            format!("rect {rect} outside texture"),
        )));
    }
    Ok(())
}

impl GpuPrimitives for WgpuPrimitives {
    type Handle = WgpuImage;

    fn upload(&self, data: &[f32], width: u32, height: u32) -> ComputeResult<Self::Handle> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch { expected, actual: data.len() });
        }

        let size_bytes = (data.len() * 4) as u64;

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("image_buffer"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        });

        Ok(WgpuImage { buffer, width, height, format: TexelFormat::R32Float, size_bytes })
    }

    fn write(&self, handle: &mut Self::Handle, data: &[f32]) -> ComputeResult<()> {
        expect_format(handle, TexelFormat::R32Float)?;
        let expected = (handle.size_bytes / 4) as usize;
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch { expected, actual: data.len() });
        }
        self.queue.write_buffer(&handle.buffer, 0, bytemuck::cast_slice(data));
        self.queue.submit(std::iter::empty());
        Ok(())
    }

    fn download(&self, handle: &Self::Handle) -> ComputeResult<Vec<f32>> {
        expect_format(handle, TexelFormat::R32Float)?;
        let bytes = self.read_back(handle)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn download_rgba8(&self, handle: &Self::Handle) -> ComputeResult<Vec<u8>> {
        expect_format(handle, TexelFormat::Rgba8)?;
        // pack4x8unorm stores r in the low byte; little-endian bytes are r, g, b, a.
        self.read_back(handle)
    }

    fn allocate(&self, width: u32, height: u32, format: TexelFormat) -> ComputeResult<Self::Handle> {
        let size_bytes = (width as u64) * (height as u64) * 4;
        self.limits.check(width, height)?;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stage_buffer"),
            size: size_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(WgpuImage { buffer, width, height, format, size_bytes })
    }

    fn prepare_variant(&mut self, variant: KernelVariant) -> ComputeResult<()> {
        if self.variants.contains_key(&variant) {
            return Ok(());
        }
        debug!(%variant, "compiling kernel variant");
        let pipelines = self.create_pipelines(variant)?;
        self.variants.insert(variant, pipelines);
        Ok(())
    }

    fn exec_blur_h(&self, src: &Self::Handle, dst: &mut Self::Handle, lut: &[f32],
                   kernel: &[f32], rect: Rect, variant: KernelVariant) -> ComputeResult<()> {
        expect_format(src, TexelFormat::R32Float)?;
        expect_format(dst, TexelFormat::R32Float)?;
        check_rect(src, &rect)?;
        let pipeline = &self.pipelines(variant)?.blur_h;

        let radius = kernel_radius(kernel) as u32;
        let stage_buf = self.create_stage_buffer(src, rect, radius, lut.len() as u32, 0.0);
        let kernel_buf = self.create_storage("kernel_buffer", kernel);
        let lut_buf = self.create_storage("lut_buffer", lut);

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_h_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: stage_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: kernel_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: lut_buf.as_entire_binding() },
            ],
        });
        self.dispatch_and_wait(pipeline, &bind_group, self.workgroups(&rect));
        Ok(())
    }

    fn exec_blur_v(&self, src: &Self::Handle, dst: &mut Self::Handle,
                   kernel: &[f32], rect: Rect, variant: KernelVariant) -> ComputeResult<()> {
        expect_format(src, TexelFormat::R32Float)?;
        expect_format(dst, TexelFormat::R32Float)?;
        check_rect(src, &rect)?;
        let pipeline = &self.pipelines(variant)?.blur_v;

        let radius = kernel_radius(kernel) as u32;
        let stage_buf = self.create_stage_buffer(src, rect, radius, 0, 0.0);
        let kernel_buf = self.create_storage("kernel_buffer", kernel);

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_v_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: stage_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: kernel_buf.as_entire_binding() },
            ],
        });
        self.dispatch_and_wait(pipeline, &bind_group, self.workgroups(&rect));
        Ok(())
    }

    fn exec_normal(&self, src: &Self::Handle, dst: &mut Self::Handle,
                   intensity: f32, rect: Rect, variant: KernelVariant) -> ComputeResult<()> {
        expect_format(src, TexelFormat::R32Float)?;
        expect_format(dst, TexelFormat::Rgba8)?;
        check_rect(src, &rect)?;
        let pipeline = &self.pipelines(variant)?.normal;

        let stage_buf = self.create_stage_buffer(src, rect, 0, 0, intensity);

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("normal_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: stage_buf.as_entire_binding() },
            ],
        });
        self.dispatch_and_wait(pipeline, &bind_group, self.workgroups(&rect));
        Ok(())
    }

    fn limits(&self) -> &GpuLimits { &self.limits }
    fn name(&self) -> &'static str { "wgpu" }
}
