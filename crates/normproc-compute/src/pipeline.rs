//! Per-tile stage orchestration.
//!
//! [`NormalPipeline`] owns every buffer of the height-to-normal chain:
//!
//! ```text
//! input --LUT + blur x--> scratch --blur y--> intermediate --gradient--> output
//! ```
//!
//! Stages only touch the active tile. Which stages run is decided by
//! [`DirtyFlags`]; the pipeline additionally tracks which kernel variant and
//! curve are currently applied so that switching between tiles with
//! different presets never reuses stale shared state.
//!
//! Buffers are bottom-up (row 0 is the bottom row) so tile rects from
//! [`TileGrid::tile_rect`] index them directly. [`HeightImage`] and
//! [`NormalMap`] are top-down and get flipped on the way in and out.

use tracing::{debug, trace, warn};

use normproc_core::{
    CoverageWarning, CurveLut, DirtyFlags, Preset, Rect, ResponseCurve, Stage, TileCoord, TileGrid,
};

use crate::backend::{GpuPrimitives, KernelVariant, TexelFormat};
use crate::config::PipelineConfig;
use crate::image::{HeightImage, NormalMap, flip_rows};
use crate::kernels::gaussian_kernel;
use crate::{ComputeError, ComputeResult};

/// Buffers sized for one input.
struct Buffers<H> {
    input: H,
    scratch: H,
    intermediate: H,
    output: H,
    width: u32,
    height: u32,
}

/// Tiled height-to-normal pipeline over a [`GpuPrimitives`] backend.
pub struct NormalPipeline<G: GpuPrimitives> {
    gpu: G,
    config: PipelineConfig,
    buffers: Option<Buffers<G::Handle>>,
    grid: TileGrid,
    coord: TileCoord,
    variant: KernelVariant,
    lut: CurveLut,
    applied_curve: Option<ResponseCurve>,
}

impl<G: GpuPrimitives> NormalPipeline<G> {
    /// Creates the pipeline and builds the default kernel variant.
    ///
    /// Fails when the backend cannot compile its stage programs.
    pub fn new(mut gpu: G, config: PipelineConfig) -> ComputeResult<Self> {
        let variant = KernelVariant::default();
        gpu.prepare_variant(variant)?;
        debug!(backend = gpu.name(), ?config, "normal pipeline created");
        Ok(Self {
            gpu,
            config,
            buffers: None,
            grid: TileGrid::SINGLE,
            coord: TileCoord::default(),
            variant,
            lut: CurveLut::identity(),
            applied_curve: None,
        })
    }

    /// Backend name.
    pub fn backend_name(&self) -> &'static str {
        self.gpu.name()
    }

    /// Bound input size, if any.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.buffers.as_ref().map(|b| (b.width, b.height))
    }

    /// Kernel variant applied by the last keyword stage.
    pub fn variant(&self) -> KernelVariant {
        self.variant
    }

    /// Lookup table computed by the last LUT stage.
    pub fn lut(&self) -> &CurveLut {
        &self.lut
    }

    /// Selected grid and tile.
    pub fn tile(&self) -> (TileGrid, TileCoord) {
        (self.grid, self.coord)
    }

    /// Binds a new height image.
    ///
    /// Buffers are reallocated only when the size changes; otherwise the
    /// input is overwritten in place and the other buffers keep their data.
    pub fn rebind_input(&mut self, image: &HeightImage) -> ComputeResult<()> {
        let (width, height) = image.dimensions();
        self.gpu.limits().check(width, height)?;

        let mut texels = image.data().to_vec();
        flip_rows(&mut texels, width as usize);

        if let Some(b) = self.buffers.as_mut().filter(|b| b.width == width && b.height == height) {
            trace!(width, height, "rebind input in place");
            self.gpu.write(&mut b.input, &texels)?;
            return Ok(());
        }

        debug!(width, height, backend = self.gpu.name(), "allocating pipeline buffers");
        self.buffers = Some(Buffers {
            input: self.gpu.upload(&texels, width, height)?,
            scratch: self.gpu.allocate(width, height, TexelFormat::R32Float)?,
            intermediate: self.gpu.allocate(width, height, TexelFormat::R32Float)?,
            output: self.gpu.allocate(width, height, TexelFormat::Rgba8)?,
            width,
            height,
        });
        Ok(())
    }

    fn buffers(&self) -> ComputeResult<&Buffers<G::Handle>> {
        self.buffers.as_ref().ok_or(ComputeError::NoInput)
    }

    /// Pixel rect of the selected tile.
    pub fn tile_rect(&self) -> ComputeResult<Rect> {
        let b = self.buffers()?;
        Ok(self.grid.tile_rect(b.width, b.height, self.coord)?)
    }

    /// Selects the tile later stages operate on.
    ///
    /// A grid that does not divide the input evenly, or leaves partial
    /// workgroups, is logged and returned but does not fail.
    pub fn set_tile(&mut self, grid: TileGrid, coord: TileCoord) -> ComputeResult<Option<CoverageWarning>> {
        self.select_tile(grid, coord)?;
        self.check_coverage(grid)
    }

    fn select_tile(&mut self, grid: TileGrid, coord: TileCoord) -> ComputeResult<()> {
        let b = self.buffers()?;
        grid.tile_rect(b.width, b.height, coord)?;
        self.grid = grid;
        self.coord = coord;
        trace!(%grid, tile = %coord, "tile selected");
        Ok(())
    }

    fn check_coverage(&self, grid: TileGrid) -> ComputeResult<Option<CoverageWarning>> {
        let b = self.buffers()?;
        let coverage = grid.coverage(b.width, b.height);
        if let Some(w) = &coverage {
            warn!(%grid, "{w}");
        }
        Ok(coverage)
    }

    /// Keyword stage: selects the kernel variant.
    pub fn update_keywords(&mut self, tiling: bool, use_scharr: bool) -> ComputeResult<()> {
        self.buffers()?;
        let variant = KernelVariant::new(tiling, use_scharr);
        trace!(%variant, "keyword stage");
        self.gpu.prepare_variant(variant)?;
        self.variant = variant;
        Ok(())
    }

    /// LUT stage: samples `curve` into the lookup table.
    pub fn compute_lut(&mut self, curve: &ResponseCurve) -> ComputeResult<()> {
        self.buffers()?;
        trace!(keys = curve.keys().len(), "lut stage");
        self.lut = CurveLut::compute(curve);
        self.applied_curve = Some(curve.clone());
        Ok(())
    }

    /// Blur stage: LUT remap and separable Gaussian over the tile.
    pub fn compute_blur(&mut self, smoothness: f32) -> ComputeResult<()> {
        if !smoothness.is_finite() || smoothness < 0.0 {
            return Err(normproc_core::Error::InvalidParameter { name: "smoothness", value: smoothness }.into());
        }
        let rect = self.tile_rect()?;
        let kernel = gaussian_kernel(smoothness, self.config.max_blur_radius);
        trace!(smoothness, taps = kernel.len(), %rect, "blur stage");
        if self.config.verbose {
            debug!(backend = self.gpu.name(), %rect, taps = kernel.len(), "dispatch blur");
        }

        let b = self.buffers.as_mut().ok_or(ComputeError::NoInput)?;
        self.gpu.exec_blur_h(&b.input, &mut b.scratch, self.lut.entries(), &kernel, rect, self.variant)?;
        self.gpu.exec_blur_v(&b.scratch, &mut b.intermediate, &kernel, rect, self.variant)?;
        Ok(())
    }

    /// Normal stage: gradient of the blurred tile to RGBA8.
    pub fn compute_normal(&mut self, intensity: f32) -> ComputeResult<()> {
        if !intensity.is_finite() || intensity < 0.0 {
            return Err(normproc_core::Error::InvalidParameter { name: "intensity", value: intensity }.into());
        }
        let rect = self.tile_rect()?;
        trace!(intensity, %rect, "normal stage");
        if self.config.verbose {
            debug!(backend = self.gpu.name(), %rect, "dispatch normal");
        }

        let b = self.buffers.as_mut().ok_or(ComputeError::NoInput)?;
        self.gpu.exec_normal(&b.intermediate, &mut b.output, intensity, rect, self.variant)?;
        Ok(())
    }

    /// Flags for shared state that does not match `preset`.
    fn stale_flags(&self, preset: &Preset) -> DirtyFlags {
        let mut flags = DirtyFlags::NONE;
        if self.variant != KernelVariant::new(preset.do_tiling, preset.use_scharr) {
            flags |= DirtyFlags::KEYWORD;
        }
        if self.applied_curve.as_ref() != Some(&preset.curve) {
            flags |= DirtyFlags::LUT;
        }
        flags
    }

    fn run_stage(&mut self, stage: Stage, preset: &Preset) -> ComputeResult<()> {
        match stage {
            Stage::Keyword => self.update_keywords(preset.do_tiling, preset.use_scharr),
            Stage::Lut => self.compute_lut(&preset.curve),
            Stage::Blur => self.compute_blur(preset.smoothness),
            Stage::Normal => self.compute_normal(preset.intensity),
        }
    }

    /// Runs the stages `flags` asks for on the selected tile, with their
    /// cascade, and clears `flags`.
    ///
    /// Returns the rect that was rewritten. On error `flags` is left as it
    /// was so the pass can be retried.
    pub fn recompute(&mut self, flags: &mut DirtyFlags, preset: &Preset) -> ComputeResult<Rect> {
        let rect = self.tile_rect()?;
        let snapshot = *flags;
        let mut pending = *flags;
        if !pending.is_empty() {
            pending |= self.stale_flags(preset);
        }
        let plan = pending.drain();
        trace!(flags = %snapshot, stages = plan.stages().len(), "recompute");

        for stage in plan {
            if let Err(e) = self.run_stage(stage, preset) {
                *flags = snapshot;
                return Err(e);
            }
        }
        *flags = DirtyFlags::NONE;
        Ok(rect)
    }

    /// Runs `flags` on every tile of `grid`, each with its own preset.
    ///
    /// `presets` is indexed `x + y * cols`. The selected tile is restored
    /// afterwards.
    pub fn recompute_all(&mut self, grid: TileGrid, presets: &[Preset], flags: &mut DirtyFlags) -> ComputeResult<()> {
        self.buffers()?;
        if presets.len() != grid.len() {
            return Err(ComputeError::BufferSizeMismatch { expected: grid.len(), actual: presets.len() });
        }
        self.check_coverage(grid)?;
        let (prev_grid, prev_coord) = (self.grid, self.coord);
        let snapshot = *flags;

        for (coord, preset) in grid.coords().zip(presets) {
            self.select_tile(grid, coord)?;
            let mut tile_flags = snapshot;
            if let Err(e) = self.recompute(&mut tile_flags, preset) {
                *flags = snapshot;
                return Err(e);
            }
        }
        debug!(%grid, flags = %snapshot, "recomputed all tiles");

        if prev_grid.validate(prev_coord).is_ok() {
            self.grid = prev_grid;
            self.coord = prev_coord;
        }
        *flags = DirtyFlags::NONE;
        Ok(())
    }

    /// Full-resolution normal map, top row first.
    pub fn extract_result(&self) -> ComputeResult<NormalMap> {
        let b = self.buffers()?;
        let mut bytes = self.gpu.download_rgba8(&b.output)?;
        flip_rows(&mut bytes, b.width as usize * 4);
        NormalMap::new(bytes, b.width, b.height)
    }

    /// Blurred height field (after LUT and blur), top row first.
    pub fn extract_intermediate(&self) -> ComputeResult<HeightImage> {
        let b = self.buffers()?;
        let mut texels = self.gpu.download(&b.intermediate)?;
        flip_rows(&mut texels, b.width as usize);
        HeightImage::new(texels, b.width, b.height)
    }

    /// Bound input, top row first.
    pub fn input(&self) -> ComputeResult<HeightImage> {
        let b = self.buffers()?;
        let mut texels = self.gpu.download(&b.input)?;
        flip_rows(&mut texels, b.width as usize);
        HeightImage::new(texels, b.width, b.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuLimits, ImageHandle};
    use crate::CpuPrimitives;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn pipeline() -> NormalPipeline<CpuPrimitives> {
        NormalPipeline::new(CpuPrimitives::new(), PipelineConfig::default()).unwrap()
    }

    /// Backend whose stage programs never build.
    struct BrokenShaders {
        limits: GpuLimits,
    }

    struct NoImage;

    impl ImageHandle for NoImage {
        fn dimensions(&self) -> (u32, u32, TexelFormat) {
            (0, 0, TexelFormat::R32Float)
        }
    }

    impl GpuPrimitives for BrokenShaders {
        type Handle = NoImage;

        fn upload(&self, _: &[f32], _: u32, _: u32) -> ComputeResult<NoImage> { unreachable!() }
        fn write(&self, _: &mut NoImage, _: &[f32]) -> ComputeResult<()> { unreachable!() }
        fn download(&self, _: &NoImage) -> ComputeResult<Vec<f32>> { unreachable!() }
        fn download_rgba8(&self, _: &NoImage) -> ComputeResult<Vec<u8>> { unreachable!() }
        fn allocate(&self, _: u32, _: u32, _: TexelFormat) -> ComputeResult<NoImage> { unreachable!() }

        fn prepare_variant(&mut self, variant: KernelVariant) -> ComputeResult<()> {
            Err(ComputeError::ShaderCompilation(format!("{variant}: entry point missing")))
        }

        fn exec_blur_h(&self, _: &NoImage, _: &mut NoImage, _: &[f32], _: &[f32], _: Rect,
                       _: KernelVariant) -> ComputeResult<()> { unreachable!() }
        fn exec_blur_v(&self, _: &NoImage, _: &mut NoImage, _: &[f32], _: Rect,
                       _: KernelVariant) -> ComputeResult<()> { unreachable!() }
        fn exec_normal(&self, _: &NoImage, _: &mut NoImage, _: f32, _: Rect,
                       _: KernelVariant) -> ComputeResult<()> { unreachable!() }

        fn limits(&self) -> &GpuLimits { &self.limits }
        fn name(&self) -> &'static str { "broken" }
    }

    /// Counts warn-level events.
    struct WarnCount(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCount {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn test_new_fails_when_shaders_do_not_build() {
        let gpu = BrokenShaders { limits: GpuLimits { max_tile_dim: 1024, max_buffer_bytes: 1 << 22 } };
        match NormalPipeline::new(gpu, PipelineConfig::default()) {
            Err(ComputeError::ShaderCompilation(msg)) => assert!(msg.contains("entry point")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("pipeline created without stage programs"),
        }
    }

    #[test]
    fn test_recompute_all_warns_once_for_uneven_grid() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCount(warnings.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let mut p = pipeline();
            p.rebind_input(&HeightImage::filled(30, 30, 0.5).unwrap()).unwrap();
            let grid = TileGrid::new(4, 4).unwrap();
            let presets = vec![Preset::default(); grid.len()];
            let mut flags = DirtyFlags::ALL;
            p.recompute_all(grid, &presets, &mut flags).unwrap();
            assert!(flags.is_empty());
        });
        assert_eq!(warnings.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_no_input() {
        let mut p = pipeline();
        assert!(matches!(p.compute_blur(1.0), Err(ComputeError::NoInput)));
        assert!(matches!(p.update_keywords(true, true), Err(ComputeError::NoInput)));
        assert!(matches!(p.extract_result(), Err(ComputeError::NoInput)));
        let mut flags = DirtyFlags::ALL;
        assert!(p.recompute(&mut flags, &Preset::default()).is_err());
        assert_eq!(flags, DirtyFlags::ALL);
    }

    #[test]
    fn test_rebind_keeps_buffers_for_same_size() {
        let mut p = pipeline();
        p.rebind_input(&HeightImage::filled(8, 8, 0.25).unwrap()).unwrap();
        let mut flags = DirtyFlags::ALL;
        p.recompute(&mut flags, &Preset::default()).unwrap();

        p.rebind_input(&HeightImage::filled(8, 8, 0.75).unwrap()).unwrap();
        // Intermediate still holds the previous result until recomputed.
        let mid = p.extract_intermediate().unwrap();
        assert!((mid.get(3, 3) - 0.25).abs() < 1e-5);
        assert_eq!(p.input().unwrap().get(0, 0), 0.75);

        p.rebind_input(&HeightImage::filled(4, 4, 0.75).unwrap()).unwrap();
        assert_eq!(p.dimensions(), Some((4, 4)));
    }

    #[test]
    fn test_set_tile_reports_coverage() {
        let mut p = pipeline();
        p.rebind_input(&HeightImage::filled(30, 30, 0.0).unwrap()).unwrap();
        let grid = TileGrid::new(4, 4).unwrap();
        let w = p.set_tile(grid, TileCoord::new(0, 0)).unwrap();
        assert!(matches!(w, Some(CoverageWarning::UnevenSplit { .. })));
        assert!(p.set_tile(grid, TileCoord::new(4, 0)).is_err());
    }

    #[test]
    fn test_stale_variant_forces_keyword() {
        let mut p = pipeline();
        p.rebind_input(&HeightImage::filled(8, 8, 0.5).unwrap()).unwrap();
        let mut flags = DirtyFlags::ALL;
        p.recompute(&mut flags, &Preset::default()).unwrap();

        let scharr = Preset { use_scharr: true, ..Preset::default() };
        let mut flags = DirtyFlags::NORMAL;
        p.recompute(&mut flags, &scharr).unwrap();
        assert!(p.variant().use_scharr());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_negative_parameters_rejected() {
        let mut p = pipeline();
        p.rebind_input(&HeightImage::filled(8, 8, 0.5).unwrap()).unwrap();
        assert!(p.compute_blur(-1.0).is_err());
        assert!(p.compute_normal(f32::NAN).is_err());
    }
}
