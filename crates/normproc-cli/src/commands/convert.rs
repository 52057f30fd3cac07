//! Convert command
//!
//! Whole-image conversion with a single preset. The preset used is recorded
//! in the history.

use crate::ConvertArgs;
use anyhow::{Context, Result};
use normproc_compute::Backend;
use normproc_core::{DirtyFlags, Preset};
use normproc_io::{default_output_path, history_path, load_history, save_history};
use tracing::{info, trace, warn};

pub fn run(args: ConvertArgs, backend: Backend, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), "convert::run");

    let history_file = history_path().ok();
    let mut history = history_file.as_ref().map(load_history).unwrap_or_default();

    let base = match args.from_history {
        Some(index) => {
            let stored = history.len();
            history
                .select(index)
                .cloned()
                .with_context(|| format!("No history entry {index} ({stored} stored)"))?
        }
        None => Preset::default(),
    };
    let preset = args.preset.apply(base)?;

    let image = super::load_height(&args.input)?;
    let mut pipeline = super::open_pipeline(backend, &image, verbose)?;

    let mut flags = DirtyFlags::ALL;
    pipeline.recompute(&mut flags, &preset).context("Processing failed")?;
    let normals = pipeline.extract_result().context("Readback failed")?;

    let output = args.output.unwrap_or_else(|| default_output_path(&args.input));
    super::save_normals(&output, &normals)?;
    info!(output = %output.display(), "normal map written");

    history.add(preset.clone());
    match &history_file {
        Some(path) => {
            if let Err(e) = save_history(path, &history) {
                warn!("Failed to save preset history: {e}");
            }
        }
        None => warn!("No config directory; preset history not saved"),
    }

    if verbose > 0 {
        println!("{} -> {}", args.input.display(), output.display());
        println!("  {}", super::describe_preset(&preset));
    }

    Ok(())
}
