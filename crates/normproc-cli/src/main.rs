//! normproc - height map to normal map converter
//!
//! Converts grayscale height images into tangent-space normal maps, either
//! as a whole or as an atlas with one preset per tile.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use normproc_compute::Backend;
use normproc_core::{ResponseCurve, TileCoord, TileGrid};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "normproc")]
#[command(author, version, about = "Height map to normal map converter")]
#[command(long_about = "
Converts grayscale height images into tangent-space normal maps.

Examples:
  normproc convert rock.png                         # -> rock_Normal.png
  normproc convert rock.png --intensity 4 --scharr
  normproc convert rock.png --from-history 0        # reuse last preset
  normproc atlas sheet.png --grid 4x4               # per-tile presets from sheet.png.normproc
  normproc tile sheet.png --tile 1,2 --smoothness 0.5
  normproc history
  normproc backends
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Compute backend: auto, cpu, wgpu
    #[arg(short, long, global = true, default_value = "auto")]
    backend: Backend,

    /// Also write log output to this file
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a whole image with one preset
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Process every tile of an atlas with its own preset
    #[command(visible_alias = "a")]
    Atlas(AtlasArgs),

    /// Edit one tile's preset and update the atlas
    #[command(visible_alias = "t")]
    Tile(TileArgs),

    /// List or clear recently used presets
    History(HistoryArgs),

    /// List available compute backends
    Backends,
}

/// Preset overrides shared by every processing command.
#[derive(Args, Clone, Default)]
struct PresetArgs {
    /// Response curve as "t:v,t:v,...", e.g. "0:0,0.5:0.8,1:1"
    #[arg(long)]
    curve: Option<ResponseCurve>,

    /// Gaussian blur sigma in pixels
    #[arg(short, long)]
    smoothness: Option<f32>,

    /// Normal strength
    #[arg(short, long)]
    intensity: Option<f32>,

    /// Treat each tile as seamless (wrap at tile edges)
    #[arg(long, overrides_with = "no_tiling")]
    tiling: bool,

    /// Clamp at tile edges
    #[arg(long)]
    no_tiling: bool,

    /// Use the Scharr operator instead of Sobel
    #[arg(long, overrides_with = "sobel")]
    scharr: bool,

    /// Use the Sobel operator
    #[arg(long)]
    sobel: bool,

    /// Preset name
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input height image (PNG)
    input: PathBuf,

    /// Output normal map (default: <input stem>_Normal.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Start from history entry N (0 = most recent) instead of the defaults
    #[arg(long, value_name = "N")]
    from_history: Option<usize>,

    #[command(flatten)]
    preset: PresetArgs,
}

#[derive(Args)]
struct AtlasArgs {
    /// Input height image (PNG)
    input: PathBuf,

    /// Tile grid as CxR; replaces a stored grid of another size
    #[arg(short, long)]
    grid: Option<TileGrid>,

    /// Output normal map (default: <input stem>_Normal.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Apply the preset options to every tile
    #[arg(long)]
    fill: bool,

    #[command(flatten)]
    preset: PresetArgs,
}

#[derive(Args)]
struct TileArgs {
    /// Input height image (PNG)
    input: PathBuf,

    /// Tile to edit as X,Y (0,0 is top-left)
    #[arg(short, long)]
    tile: TileCoord,

    /// Tile grid as CxR; replaces a stored grid of another size
    #[arg(short, long)]
    grid: Option<TileGrid>,

    /// Output normal map (default: <input stem>_Normal.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Apply the edit to every tile
    #[arg(long)]
    all: bool,

    /// Also copy the edited preset onto these tiles (X,Y; repeatable)
    #[arg(long, value_name = "X,Y")]
    copy_to: Vec<TileCoord>,

    #[command(flatten)]
    preset: PresetArgs,
}

#[derive(Args)]
struct HistoryArgs {
    /// Remove every entry
    #[arg(long)]
    clear: bool,
}

/// Installs the stderr subscriber and, with `--log`, a file sink.
///
/// `RUST_LOG` wins over `-v`. The returned guard flushes the file on drop.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install logger")?;
    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log.as_deref())?;

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Convert(args) => commands::convert::run(args, cli.backend, cli.verbose),
        Commands::Atlas(args) => commands::atlas::run(args, cli.backend, cli.verbose),
        Commands::Tile(args) => commands::tile::run(args, cli.backend, cli.verbose),
        Commands::History(args) => commands::history::run(args, cli.verbose),
        Commands::Backends => commands::backends::run(cli.verbose),
    }
}
