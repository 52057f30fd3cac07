//! History command
//!
//! Lists or clears the recently used presets.

use crate::HistoryArgs;
use anyhow::{Context, Result};
use normproc_core::PresetHistory;
use normproc_io::{history_path, load_history, save_history};
use tracing::trace;

pub fn run(args: HistoryArgs, verbose: u8) -> Result<()> {
    let path = history_path().context("Cannot locate preset history")?;
    trace!(path = %path.display(), clear = args.clear, "history::run");

    if args.clear {
        save_history(&path, &PresetHistory::new())
            .with_context(|| format!("Failed to clear: {}", path.display()))?;
        if verbose > 0 {
            println!("Cleared {}", path.display());
        }
        return Ok(());
    }

    let history = load_history(&path);
    if history.is_empty() {
        println!("No recent presets");
        return Ok(());
    }
    for (i, preset) in history.iter().enumerate() {
        println!("{i}: {}", super::describe_preset(preset));
    }
    if verbose > 0 {
        println!("({})", path.display());
    }
    Ok(())
}
