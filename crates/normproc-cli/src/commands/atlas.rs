//! Atlas command
//!
//! Processes every tile with its own preset. Presets come from the sidecar
//! next to the input when it is valid; otherwise every tile starts from the
//! defaults (or the command-line preset with `--fill`).

use crate::AtlasArgs;
use anyhow::{Context, Result};
use normproc_compute::Backend;
use normproc_core::{AtlasState, Preset, TileGrid};
use normproc_io::{default_output_path, load_sidecar, save_sidecar};
use tracing::{info, trace};

pub fn run(args: AtlasArgs, backend: Backend, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), grid = ?args.grid, "atlas::run");

    let mut atlas = AtlasState::new(args.grid.unwrap_or(TileGrid::SINGLE));
    let loaded = load_sidecar(&args.input, &mut atlas)
        .with_context(|| format!("Failed to read presets for {}", args.input.display()))?;
    if let Some(grid) = args.grid.filter(|g| loaded && *g != atlas.grid()) {
        info!(from = %atlas.grid(), to = %grid, "grid changed, presets reset");
        atlas.resize(grid);
    }
    if args.fill {
        atlas.fill(&args.preset.apply(Preset::default())?);
    }

    let image = super::load_height(&args.input)?;
    let mut pipeline = super::open_pipeline(backend, &image, verbose)?;

    let mut flags = atlas.take_pending();
    pipeline
        .recompute_all(atlas.grid(), atlas.presets(), &mut flags)
        .context("Processing failed")?;
    let normals = pipeline.extract_result().context("Readback failed")?;

    let output = args.output.unwrap_or_else(|| default_output_path(&args.input));
    super::save_normals(&output, &normals)?;
    let sidecar = save_sidecar(&args.input, &atlas)
        .with_context(|| format!("Failed to save presets for {}", args.input.display()))?;
    info!(output = %output.display(), sidecar = %sidecar.display(), "atlas written");

    if verbose > 0 {
        println!(
            "{} -> {} ({} grid, presets {})",
            args.input.display(),
            output.display(),
            atlas.grid(),
            if loaded { "loaded" } else { "new" }
        );
        for (coord, preset) in atlas.grid().coords().zip(atlas.presets()) {
            println!("  [{coord}] {}", super::describe_preset(preset));
        }
    }

    Ok(())
}
