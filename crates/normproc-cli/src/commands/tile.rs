//! Tile command
//!
//! Edits the preset of one tile and rewrites the atlas. All tiles are first
//! rendered with their stored presets; the edit then reruns only the stages
//! its changes dirty, on the edited tile.

use crate::TileArgs;
use anyhow::{Context, Result, bail};
use normproc_compute::Backend;
use normproc_core::{AtlasState, DirtyFlags, TileGrid};
use normproc_io::{default_output_path, load_sidecar, save_sidecar};
use tracing::{debug, info, trace};

pub fn run(args: TileArgs, backend: Backend, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), tile = %args.tile, "tile::run");

    let mut atlas = AtlasState::new(args.grid.unwrap_or(TileGrid::SINGLE));
    let loaded = load_sidecar(&args.input, &mut atlas)
        .with_context(|| format!("Failed to read presets for {}", args.input.display()))?;
    if let Some(grid) = args.grid.filter(|g| loaded && *g != atlas.grid()) {
        info!(from = %atlas.grid(), to = %grid, "grid changed, presets reset");
        atlas.resize(grid);
    }
    let grid = atlas.grid();
    atlas.set_active(args.tile).with_context(|| format!("Tile {} not in {grid} grid", args.tile))?;
    atlas.set_lock_params(args.all);
    if args.preset.is_empty() && args.copy_to.is_empty() {
        bail!("Nothing to change; give preset options or --copy-to");
    }

    let image = super::load_height(&args.input)?;
    let mut pipeline = super::open_pipeline(backend, &image, verbose)?;

    // Baseline: every tile with its stored preset.
    let mut flags = atlas.take_pending();
    pipeline
        .recompute_all(grid, atlas.presets(), &mut flags)
        .context("Processing failed")?;

    let edited = args.preset.apply(atlas.active_preset().clone())?;
    let changed = atlas.edit_active(|p| *p = edited)?;
    let mut flags = atlas.take_pending();
    debug!(tile = %args.tile, %changed, "preset edited");

    if args.all {
        pipeline
            .recompute_all(grid, atlas.presets(), &mut flags)
            .context("Processing failed")?;
    } else {
        pipeline.set_tile(grid, args.tile)?;
        let rect = pipeline
            .recompute(&mut flags, atlas.active_preset())
            .context("Processing failed")?;
        debug!(%rect, "tile recomputed");
    }

    for &target in &args.copy_to {
        atlas
            .apply_active_to(target)
            .with_context(|| format!("Tile {target} not in {grid} grid"))?;
        pipeline.set_tile(grid, target)?;
        let mut flags = DirtyFlags::ALL;
        pipeline.recompute(&mut flags, atlas.active_preset()).context("Processing failed")?;
    }

    let normals = pipeline.extract_result().context("Readback failed")?;
    let output = args.output.unwrap_or_else(|| default_output_path(&args.input));
    super::save_normals(&output, &normals)?;
    save_sidecar(&args.input, &atlas)
        .with_context(|| format!("Failed to save presets for {}", args.input.display()))?;
    info!(output = %output.display(), tile = %args.tile, "tile updated");

    if verbose > 0 {
        println!("[{}] {} ({changed})", args.tile, super::describe_preset(atlas.active_preset()));
        for target in &args.copy_to {
            println!("  copied to [{target}]");
        }
    }

    Ok(())
}
