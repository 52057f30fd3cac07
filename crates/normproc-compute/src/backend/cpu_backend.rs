//! CPU backend using rayon for parallelization.

use rayon::prelude::*;

use normproc_core::{Rect, sample_lut};

use super::GpuLimits;
use super::gpu_primitives::{GpuPrimitives, ImageHandle, KernelVariant, TexelFormat};
use crate::kernels::{address_x, address_y, derive_normal, encode_normal, kernel_radius};
use crate::{ComputeError, ComputeResult};

/// Texel storage of a [`CpuImage`].
enum CpuData {
    F32(Vec<f32>),
    Rgba8(Vec<[u8; 4]>),
}

/// CPU image handle - data stored in RAM.
pub struct CpuImage {
    data: CpuData,
    width: u32,
    height: u32,
}

impl CpuImage {
    fn f32(data: Vec<f32>, width: u32, height: u32) -> Self {
        Self { data: CpuData::F32(data), width, height }
    }

    /// `f32` texels, bottom row first. `None` for `Rgba8` images.
    pub fn texels(&self) -> Option<&[f32]> {
        match &self.data {
            CpuData::F32(v) => Some(v),
            CpuData::Rgba8(_) => None,
        }
    }

    fn f32_data(&self) -> ComputeResult<&[f32]> {
        match &self.data {
            CpuData::F32(v) => Ok(v),
            CpuData::Rgba8(_) => Err(format_mismatch(TexelFormat::R32Float, TexelFormat::Rgba8)),
        }
    }

    fn f32_data_mut(&mut self) -> ComputeResult<&mut [f32]> {
        match &mut self.data {
            CpuData::F32(v) => Ok(v),
            CpuData::Rgba8(_) => Err(format_mismatch(TexelFormat::R32Float, TexelFormat::Rgba8)),
        }
    }

    fn rgba_data_mut(&mut self) -> ComputeResult<&mut [[u8; 4]]> {
        match &mut self.data {
            CpuData::Rgba8(v) => Ok(v),
            CpuData::F32(_) => Err(format_mismatch(TexelFormat::Rgba8, TexelFormat::R32Float)),
        }
    }
}

fn format_mismatch(expected: TexelFormat, actual: TexelFormat) -> ComputeError {
    ComputeError::FormatMismatch { expected, actual }
}

impl ImageHandle for CpuImage {
    fn dimensions(&self) -> (u32, u32, TexelFormat) {
        let format = match self.data {
            CpuData::F32(_) => TexelFormat::R32Float,
            CpuData::Rgba8(_) => TexelFormat::Rgba8,
        };
        (self.width, self.height, format)
    }
}

/// CPU primitives implementation.
pub struct CpuPrimitives {
    limits: GpuLimits,
}

impl CpuPrimitives {
    /// Host memory is the only bound, so any image size is accepted.
    pub fn new() -> Self {
        Self {
            limits: GpuLimits {
                max_tile_dim: u32::MAX,
                max_buffer_bytes: u64::MAX,
            },
        }
    }
}

impl Default for CpuPrimitives {
    fn default() -> Self {
        Self::new()
    }
}

fn check_rect(handle: &CpuImage, rect: &Rect) -> ComputeResult<()> {
    if rect.is_empty() || !rect.fits_within(handle.width, handle.height) {
        return Err(ComputeError::Core(normproc_core::Error::invalid_dimensions(
            handle.width,
            handle.height,
            format!("rect {rect} outside texture"),
        )));
    }
    Ok(())
}

impl GpuPrimitives for CpuPrimitives {
    type Handle = CpuImage;

    fn upload(&self, data: &[f32], width: u32, height: u32) -> ComputeResult<Self::Handle> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch { expected, actual: data.len() });
        }
        Ok(CpuImage::f32(data.to_vec(), width, height))
    }

    fn write(&self, handle: &mut Self::Handle, data: &[f32]) -> ComputeResult<()> {
        let dst = handle.f32_data_mut()?;
        if dst.len() != data.len() {
            return Err(ComputeError::BufferSizeMismatch { expected: dst.len(), actual: data.len() });
        }
        dst.copy_from_slice(data);
        Ok(())
    }

    fn download(&self, handle: &Self::Handle) -> ComputeResult<Vec<f32>> {
        Ok(handle.f32_data()?.to_vec())
    }

    fn download_rgba8(&self, handle: &Self::Handle) -> ComputeResult<Vec<u8>> {
        match &handle.data {
            CpuData::Rgba8(v) => Ok(v.iter().flatten().copied().collect()),
            CpuData::F32(_) => Err(format_mismatch(TexelFormat::Rgba8, TexelFormat::R32Float)),
        }
    }

    fn allocate(&self, width: u32, height: u32, format: TexelFormat) -> ComputeResult<Self::Handle> {
        let size = (width as usize) * (height as usize);
        let data = match format {
            TexelFormat::R32Float => CpuData::F32(vec![0.0; size]),
            TexelFormat::Rgba8 => CpuData::Rgba8(vec![[0; 4]; size]),
        };
        Ok(CpuImage { data, width, height })
    }

    fn prepare_variant(&mut self, _variant: KernelVariant) -> ComputeResult<()> {
        // Variants are plain branches in the CPU kernels.
        Ok(())
    }

    fn exec_blur_h(&self, src: &Self::Handle, dst: &mut Self::Handle, lut: &[f32],
                   kernel: &[f32], rect: Rect, variant: KernelVariant) -> ComputeResult<()> {
        check_rect(src, &rect)?;
        let w = src.width as usize;
        let r = kernel_radius(kernel);
        let src = src.f32_data()?;
        let (y0, y1) = (rect.y as usize, rect.top() as usize);

        dst.f32_data_mut()?
            .par_chunks_mut(w)
            .enumerate()
            .filter(|(y, _)| (y0..y1).contains(y))
            .for_each(|(y, row)| {
                let src_row = &src[y * w..(y + 1) * w];
                for x in rect.x..rect.right() {
                    let mut acc = 0.0;
                    for (ki, k) in kernel.iter().enumerate() {
                        let sx = address_x(x as i32 + ki as i32 - r, &rect, variant.tiling);
                        acc += sample_lut(lut, src_row[sx]) * k;
                    }
                    row[x as usize] = acc;
                }
            });

        Ok(())
    }

    fn exec_blur_v(&self, src: &Self::Handle, dst: &mut Self::Handle,
                   kernel: &[f32], rect: Rect, variant: KernelVariant) -> ComputeResult<()> {
        check_rect(src, &rect)?;
        let w = src.width as usize;
        let r = kernel_radius(kernel);
        let src = src.f32_data()?;
        let (y0, y1) = (rect.y as usize, rect.top() as usize);

        dst.f32_data_mut()?
            .par_chunks_mut(w)
            .enumerate()
            .filter(|(y, _)| (y0..y1).contains(y))
            .for_each(|(y, row)| {
                for x in rect.x as usize..rect.right() as usize {
                    let mut acc = 0.0;
                    for (ki, k) in kernel.iter().enumerate() {
                        let sy = address_y(y as i32 + ki as i32 - r, &rect, variant.tiling);
                        acc += src[sy * w + x] * k;
                    }
                    row[x] = acc;
                }
            });

        Ok(())
    }

    fn exec_normal(&self, src: &Self::Handle, dst: &mut Self::Handle,
                   intensity: f32, rect: Rect, variant: KernelVariant) -> ComputeResult<()> {
        check_rect(src, &rect)?;
        let w = src.width as usize;
        let src = src.f32_data()?;
        let weights = variant.operator.weights();
        let norm = variant.operator.norm();
        let wrap = variant.tiling;
        let (y0, y1) = (rect.y as usize, rect.top() as usize);

        dst.rgba_data_mut()?
            .par_chunks_mut(w)
            .enumerate()
            .filter(|(y, _)| (y0..y1).contains(y))
            .for_each(|(y, row)| {
                let yi = y as i32;
                for x in rect.x..rect.right() {
                    let xi = x as i32;
                    let s = |dx: i32, dy: i32| {
                        src[address_y(yi + dy, &rect, wrap) * w + address_x(xi + dx, &rect, wrap)]
                    };
                    let mut gx = 0.0;
                    let mut gy = 0.0;
                    for (i, wt) in weights.iter().enumerate() {
                        let o = i as i32 - 1;
                        gx += wt * (s(1, o) - s(-1, o));
                        gy += wt * (s(o, 1) - s(o, -1));
                    }
                    let n = derive_normal(gx * norm, gy * norm, intensity);
                    row[x as usize] = encode_normal(n);
                }
            });

        Ok(())
    }

    fn limits(&self) -> &GpuLimits {
        &self.limits
    }

    fn name(&self) -> &'static str {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::gaussian_kernel;

    fn identity_lut() -> Vec<f32> {
        (0..256).map(|i| i as f32 / 255.0).collect()
    }

    #[test]
    fn test_blur_h_stays_in_rect() {
        let cpu = CpuPrimitives::new();
        let src = cpu.upload(&[1.0; 16], 4, 4).unwrap();
        let mut dst = cpu.allocate(4, 4, TexelFormat::R32Float).unwrap();
        let rect = Rect::new(2, 2, 2, 2);
        cpu.exec_blur_h(&src, &mut dst, &identity_lut(), &gaussian_kernel(1.0, 8), rect,
                        KernelVariant::default()).unwrap();
        let out = cpu.download(&dst).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let v = out[y * 4 + x];
                if rect.contains(x as u32, y as u32) {
                    assert!((v - 1.0).abs() < 1e-5);
                } else {
                    assert_eq!(v, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_normal_of_ramp() {
        let cpu = CpuPrimitives::new();
        // Height grows with x by 0.1 per pixel.
        let data: Vec<f32> = (0..64).map(|i| (i % 8) as f32 * 0.1).collect();
        let src = cpu.upload(&data, 8, 8).unwrap();
        let mut dst = cpu.allocate(8, 8, TexelFormat::Rgba8).unwrap();
        cpu.exec_normal(&src, &mut dst, 1.0, Rect::full(8, 8), KernelVariant::default()).unwrap();
        let bytes = cpu.download_rgba8(&dst).unwrap();
        let px = &bytes[(4 * 8 + 4) * 4..(4 * 8 + 4) * 4 + 4];
        // gx = 0.2 * 4 / 8 = 0.1, so the normal leans towards -x.
        assert!(px[0] < 128);
        assert_eq!(px[1], 128);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_format_checks() {
        let cpu = CpuPrimitives::new();
        let rgba = cpu.allocate(2, 2, TexelFormat::Rgba8).unwrap();
        assert!(cpu.download(&rgba).is_err());
        let mut f = cpu.allocate(2, 2, TexelFormat::R32Float).unwrap();
        assert!(cpu.write(&mut f, &[0.0; 3]).is_err());
        assert_eq!(f.format(), TexelFormat::R32Float);
    }
}
