//! # normproc-io
//!
//! File I/O around the normal-map pipeline:
//!
//! - [`png`](crate::png) - height sources in, normal maps out
//! - [`sidecar`] - per-image atlas presets (`<source>.normproc`)
//! - [`history`] - recently used presets
//!
//! Corrupt preset data is never fatal: loaders log at `info` level and fall
//! back to what the caller already has.

#![warn(missing_docs)]

pub mod error;
pub mod history;
pub mod png;
pub mod sidecar;

pub use error::{IoError, IoResult};
pub use history::{ENV_HISTORY, history_path, load_history, save_history};
pub use self::png::{decode_height, default_output_path, encode_png, read_height, write_png};
pub use sidecar::{Sidecar, load_sidecar, read_sidecar, save_sidecar, sidecar_path};
