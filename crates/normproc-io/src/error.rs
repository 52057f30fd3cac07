//! Error types for I/O operations.

use std::io;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Unsupported color type / bit depth combination.
    #[error("unsupported pixel layout: {0}")]
    UnsupportedFormat(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sidecar content does not describe a valid atlas.
    #[error("invalid sidecar: {0}")]
    InvalidSidecar(String),

    /// No platform config directory and no override.
    #[error("no config directory available; set {0}")]
    NoConfigDir(&'static str),

    /// Image buffer rejected by the compute crate.
    #[error(transparent)]
    Compute(#[from] normproc_compute::ComputeError),

    /// Grid or preset rejected by the core crate.
    #[error(transparent)]
    Core(#[from] normproc_core::Error),
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
